// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capture helpers for asserting on emitted logs and metrics.

use std::io::Write;
use std::sync::{Arc, Mutex};

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData, ResourceMetrics, ScopeMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();

        Self {
            exporter: exporter.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(exporter).build(),
        }
    }

    #[must_use]
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub fn assert_attributes_contain(&self, key_values: &[KeyValue]) {
        self.provider.force_flush().unwrap();
        let attributes: Vec<KeyValue> = self
            .exporter
            .get_finished_metrics()
            .unwrap()
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .flat_map(attributes_of)
            .collect();

        for attr in key_values {
            assert!(
                attributes.contains(attr),
                "attribute {attr:?} not found in collected attributes: {attributes:?}"
            );
        }
    }

    /// Asserts the most recently exported value of the `u64` gauge `name`.
    pub fn assert_gauge(&self, name: &str, expected: u64) {
        self.provider.force_flush().unwrap();
        let last = self
            .exporter
            .get_finished_metrics()
            .unwrap()
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .filter(|metric| metric.name() == name)
            .filter_map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Gauge(gauge)) => gauge.data_points().map(|point| point.value()).last(),
                _ => None,
            })
            .last();

        assert_eq!(last, Some(expected), "unexpected value for gauge {name}");
    }
}

fn attributes_of(metric: &Metric) -> Vec<KeyValue> {
    macro_rules! points {
        ($data:expr) => {
            match $data {
                MetricData::Gauge(data) => data.data_points().flat_map(|v| v.attributes().cloned()).collect(),
                MetricData::Sum(data) => data.data_points().flat_map(|v| v.attributes().cloned()).collect(),
                MetricData::Histogram(data) => data.data_points().flat_map(|v| v.attributes().cloned()).collect(),
                MetricData::ExponentialHistogram(data) => data.data_points().flat_map(|v| v.attributes().cloned()).collect(),
            }
        };
    }

    match metric.data() {
        AggregatedMetrics::F64(data) => points!(data),
        AggregatedMetrics::U64(data) => points!(data),
        AggregatedMetrics::I64(data) => points!(data),
    }
}

/// Collects formatted `tracing` output into a shared buffer.
///
/// Install with `tracing::subscriber::set_default(capture.subscriber())` so only the
/// current thread is captured.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
