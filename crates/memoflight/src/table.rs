// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The entry table behind [`MemoCache`](crate::MemoCache).
//!
//! The table is plain synchronous bookkeeping. It is always accessed under the cache
//! lock and never awaits, so every transition here is atomic with respect to other
//! callers. Slots and values leaving the table are handed back to the caller so they
//! are dropped after the lock is released.

use std::{
    collections::{BTreeMap, HashMap},
    time::Instant,
};

use foldhash::fast::RandomState;

use crate::{CacheStats, Ttl};

/// One cache slot. `P` is the shared handle to an in-flight operation.
#[derive(Debug)]
pub(crate) enum Slot<V, P> {
    Pending {
        id: u64,
        ttl: Ttl,
        flight: P,
    },
    Ready {
        seq: u64,
        value: V,
        created_at: Instant,
        ttl: Ttl,
    },
}

/// Outcome of looking a key up on behalf of a `resolve` call.
#[derive(Debug)]
pub(crate) enum Lookup<V, P> {
    /// A fresh value was found.
    Hit(V),
    /// An operation is in flight; the caller attaches to it.
    InFlight(P),
    /// Nothing usable is stored. `stale` holds the expired value that was removed.
    Absent { stale: Option<V> },
}

/// Result of committing a successful operation.
#[derive(Debug)]
pub(crate) struct Committed<V, P> {
    /// `false` when the pending slot was invalidated or replaced while in flight.
    pub stored: bool,
    /// The handle of the settled pending slot.
    pub settled: Option<P>,
    /// Entries pushed out to respect the capacity bound, oldest first.
    pub evicted: Vec<(String, V)>,
}

#[derive(Debug)]
pub(crate) struct Table<V, P> {
    entries: HashMap<String, Slot<V, P>, RandomState>,
    // Ready entries keyed by the order in which they became ready.
    ready_order: BTreeMap<u64, String>,
    max_size: usize,
    next_id: u64,
    hits: u64,
    misses: u64,
}

impl<V, P> Table<V, P>
where
    V: Clone,
    P: Clone,
{
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::default(),
            ready_order: BTreeMap::new(),
            max_size,
            next_id: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up `key` for a resolve call and records the hit or miss.
    ///
    /// A stale `Ready` value is removed before reporting the key as absent.
    pub fn lookup(&mut self, key: &str, now: Instant) -> Lookup<V, P> {
        match self.entries.get(key) {
            Some(Slot::Ready {
                value, created_at, ttl, ..
            }) => {
                if !ttl.is_expired(*created_at, now) {
                    self.hits += 1;
                    return Lookup::Hit(value.clone());
                }
            }
            Some(Slot::Pending { flight, .. }) => {
                self.misses += 1;
                return Lookup::InFlight(flight.clone());
            }
            None => {
                self.misses += 1;
                return Lookup::Absent { stale: None };
            }
        }

        self.misses += 1;
        let stale = match self.remove(key) {
            Some(Slot::Ready { value, .. }) => Some(value),
            _ => None,
        };
        Lookup::Absent { stale }
    }

    /// Returns a fresh value without recording statistics.
    ///
    /// A stale value is left in place for the next lookup or purge to remove.
    pub fn peek(&self, key: &str, now: Instant) -> Option<V> {
        match self.entries.get(key)? {
            Slot::Ready {
                value, created_at, ttl, ..
            } if !ttl.is_expired(*created_at, now) => Some(value.clone()),
            _ => None,
        }
    }

    /// Hands out the identifier for the next pending slot.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Registers pending slot `id` and returns the slot it replaced, if any.
    pub fn insert_pending(&mut self, key: String, id: u64, ttl: Ttl, flight: P) -> Option<Slot<V, P>> {
        let replaced = self.entries.insert(key, Slot::Pending { id, ttl, flight });
        if let Some(Slot::Ready { seq, .. }) = &replaced {
            self.ready_order.remove(seq);
        }
        replaced
    }

    /// Promotes the pending slot `id` to `Ready`, evicting the oldest ready entries
    /// if the table is over capacity.
    pub fn complete(&mut self, key: &str, id: u64, value: V, now: Instant) -> Committed<V, P> {
        let ttl = match self.entries.get(key) {
            Some(Slot::Pending { id: current, ttl, .. }) if *current == id => *ttl,
            _ => {
                return Committed {
                    stored: false,
                    settled: None,
                    evicted: Vec::new(),
                };
            }
        };

        let seq = self.next_id();
        self.ready_order.insert(seq, key.to_owned());
        let ready = Slot::Ready {
            seq,
            value,
            created_at: now,
            ttl,
        };
        let settled = match self.entries.get_mut(key).map(|slot| std::mem::replace(slot, ready)) {
            Some(Slot::Pending { flight, .. }) => Some(flight),
            _ => None,
        };

        let mut evicted = Vec::new();
        while self.ready_order.len() > self.max_size {
            // The newest entry always has the highest sequence number, so it is
            // never the oldest while `max_size >= 1`.
            let Some((_, oldest)) = self.ready_order.pop_first() else {
                break;
            };
            if let Some(Slot::Ready { value, .. }) = self.entries.remove(&oldest) {
                evicted.push((oldest, value));
            }
        }

        Committed {
            stored: true,
            settled,
            evicted,
        }
    }

    /// Removes the pending slot `id` after its operation failed and returns its handle.
    ///
    /// Returns `None` if the slot was already invalidated or replaced.
    pub fn abandon(&mut self, key: &str, id: u64) -> Option<P> {
        match self.entries.get(key) {
            Some(Slot::Pending { id: current, .. }) if *current == id => match self.entries.remove(key) {
                Some(Slot::Pending { flight, .. }) => Some(flight),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Slot<V, P>> {
        let slot = self.entries.remove(key)?;
        if let Slot::Ready { seq, .. } = &slot {
            self.ready_order.remove(seq);
        }
        Some(slot)
    }

    pub fn remove_prefix(&mut self, prefix: &str) -> Vec<Slot<V, P>> {
        let keys: Vec<String> = self.entries.keys().filter(|key| key.starts_with(prefix)).cloned().collect();
        self.remove_all(&keys)
    }

    pub fn purge_expired(&mut self, now: Instant) -> Vec<Slot<V, P>> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| {
                matches!(slot, Slot::Ready { created_at, ttl, .. } if ttl.is_expired(*created_at, now))
            })
            .map(|(key, _)| key.clone())
            .collect();
        self.remove_all(&keys)
    }

    /// Removes every entry and returns them.
    pub fn clear(&mut self) -> Vec<Slot<V, P>> {
        self.ready_order.clear();
        self.entries.drain().map(|(_, slot)| slot).collect()
    }

    fn remove_all(&mut self, keys: &[String]) -> Vec<Slot<V, P>> {
        keys.iter().filter_map(|key| self.remove(key)).collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            pending: self.entries.len() - self.ready_order.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}
