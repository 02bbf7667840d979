//! Bounded, concurrent connection-tracking table (`spec.md` §3.3, §4.3, C5).
//!
//! Backed by `DashMap`, the same sharded-locking concurrency shape
//! `iHaydenzZ-NetGuard`'s per-process traffic table uses for lock-free(ish)
//! concurrent access — building a bespoke sharded map would just duplicate
//! what `DashMap` already provides. Eviction under capacity pressure is
//! sampling-based approximate LRU: a fixed number of resident entries are
//! sampled and the oldest-touched one is removed, the same trade-off the
//! kernel's `BPF_MAP_TYPE_LRU_HASH` makes (`spec.md` §3.3).

use crate::entry::FlowEntry;
use crate::key::FlowKey;
use dashmap::DashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Number of resident entries sampled per eviction when the table is at
/// capacity. Small relative to `capacity` so eviction stays O(1)-ish; not
/// exhaustive, so the evicted entry is only an approximation of the true LRU.
const EVICTION_SAMPLE_SIZE: usize = 8;

pub struct FlowTable {
    capacity: usize,
    entries: DashMap<FlowKey, Arc<FlowEntry>>,
}

/// Outcome of looking a packet's key up against both directions
/// (`spec.md` §4.4).
pub enum Lookup {
    /// Hit under the packet's own key: this packet is in the forward
    /// direction of the flow.
    Forward(Arc<FlowEntry>),
    /// Hit under the reversed key: this packet is the reply. Carries the key
    /// that actually matched so callers can address `delete`/re-insert by it.
    Reply(FlowKey, Arc<FlowEntry>),
    /// Neither direction has an entry: a new flow.
    Miss,
}

impl FlowTable {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: DashMap::with_capacity(capacity.min(1024)) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tries `K` then `reverse(K)`. A forward hit wins even in the race
    /// window where both could transiently exist (`spec.md` §4.4 tie-break).
    pub fn lookup(&self, key: FlowKey, now: u32) -> Lookup {
        if let Some(entry) = self.entries.get(&key) {
            entry.touch(now);
            return Lookup::Forward(Arc::clone(&entry));
        }
        let reversed = key.reverse();
        if let Some(entry) = self.entries.get(&reversed) {
            entry.touch(now);
            return Lookup::Reply(reversed, Arc::clone(&entry));
        }
        Lookup::Miss
    }

    /// Whether `reverse(key)` also has a resident entry. Invariant 3.3
    /// forbids this; callers use it only to detect and count the race
    /// window where it transiently happens (`spec.md` §7 invariant
    /// violations), never to change the forward-wins decision.
    pub fn has_reverse_entry(&self, key: &FlowKey) -> bool {
        self.entries.contains_key(&key.reverse())
    }

    /// Inserts `entry` under `key`. If at capacity, evicts an
    /// approximately-least-recently-used resident entry first and reports
    /// whether an eviction occurred (for the `table_evictions` counter).
    pub fn insert(&self, key: FlowKey, entry: Arc<FlowEntry>) -> bool {
        let evicted = if self.entries.len() >= self.capacity {
            self.evict_one()
        } else {
            false
        };
        self.entries.insert(key, entry);
        evicted
    }

    pub fn delete(&self, key: &FlowKey) {
        self.entries.remove(key);
    }

    fn evict_one(&self) -> bool {
        let mut oldest_key: Option<FlowKey> = None;
        let mut oldest_touch = u32::MAX;
        let mut sampled = 0usize;

        for item in self.entries.iter() {
            if sampled >= EVICTION_SAMPLE_SIZE {
                break;
            }
            sampled = sampled.saturating_add(1);
            let touched = item.value().last_touched.load(Ordering::Relaxed);
            if touched <= oldest_touch {
                oldest_touch = touched;
                oldest_key = Some(*item.key());
            }
        }

        if let Some(key) = oldest_key {
            tracing::debug!(sampled, last_touched = oldest_touch, "evicting approximately-LRU entry under table pressure");
            self.entries.remove(&key);
            true
        } else {
            false
        }
    }
}
