// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Gauge, Meter, MeterProvider},
};

use crate::{
    cache::CacheName,
    telemetry::{CacheActivity, CacheOperation, attributes},
};

const METER_NAME: &str = "memoflight";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const CACHE_EVENT_COUNT_NAME: &str = "cache.event.count";
const CACHE_SIZE_NAME: &str = "cache.size";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

/// Instruments shared by every clone of a cache.
#[derive(Clone, Debug)]
pub(crate) struct Instruments {
    events: Counter<u64>,
    size: Gauge<u64>,
}

impl Instruments {
    pub fn new(meter: &Meter) -> Self {
        Self {
            events: meter
                .u64_counter(CACHE_EVENT_COUNT_NAME)
                .with_description("Cache events")
                .with_unit("{event}")
                .build(),
            size: meter
                .u64_gauge(CACHE_SIZE_NAME)
                .with_description("Number of entries in the cache")
                .with_unit("{entry}")
                .build(),
        }
    }

    pub fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: u64) {
        let attrs = [
            KeyValue::new(attributes::CACHE_NAME, cache_name),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
        ];
        self.events.add(count, &attrs);
    }

    pub fn record_size(&self, cache_name: CacheName, size: u64) {
        self.size.record(size, &[KeyValue::new(attributes::CACHE_NAME, cache_name)]);
    }
}
