//! Process-wide registry of shared decoded segments (spec.md §4.5).
//!
//! Keyed by `(base_pc, crc32c, arena_size)` so that separate `Machine`
//! instances executing byte-identical code at the same address share one
//! `Arc<DecodedExecuteSegment>` rather than re-decoding it. A per-slot mutex
//! guards construction of that one entry; the registry-wide mutex is held
//! only to insert or remove slots, never across a decode (spec.md §4.5 /
//! §5's concurrency contract).

use crate::arena::Arena;
use crate::error::MachineException;
use crate::segment::DecodedExecuteSegment;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    pub base_pc: u64,
    pub crc32c: u32,
    pub arena_size: u64,
}

/// One registry slot: either under construction or ready. Holding this
/// entry's `Mutex` only ever guards this one segment's build, never any
/// other slot's.
enum Slot {
    Building,
    Ready(Arc<DecodedExecuteSegment>),
}

#[derive(Default)]
pub struct SharedSegmentRegistry {
    slots: Mutex<HashMap<SegmentKey, Arc<Mutex<Slot>>>>,
}

impl SharedSegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global process-wide instance, mirroring `libloong`'s process-wide
    /// shared-segment cache (spec.md §4.5).
    pub fn global() -> &'static SharedSegmentRegistry {
        static REGISTRY: OnceLock<SharedSegmentRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SharedSegmentRegistry::new)
    }

    /// Look up or build the segment for `key`, decoding `[base_pc,
    /// base_pc+len)` out of `arena` only if no other caller has already
    /// built (or is building) the identical entry.
    pub fn get_or_build(
        &self,
        key: SegmentKey,
        arena: &Arena,
        len: u64,
    ) -> Result<Arc<DecodedExecuteSegment>, MachineException> {
        let per_slot = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(Slot::Building)))
                .clone()
        };

        let mut guard = per_slot.lock().unwrap();
        match &*guard {
            Slot::Ready(segment) => Ok(segment.clone()),
            Slot::Building => {
                let segment = Arc::new(DecodedExecuteSegment::build(arena, key.base_pc, len)?);
                *guard = Slot::Ready(segment.clone());
                Ok(segment)
            }
        }
    }

    /// Drop the registry's reference to `key` if no `Machine` still holds an
    /// `Arc` to it — the sole garbage-collection primitive (spec.md §4.5:
    /// "segments are reclaimed only when the last referencing `Machine` is
    /// destroyed and no other `Machine` shares the same key").
    pub fn remove_if_unique(&self, key: &SegmentKey) {
        let mut slots = self.slots.lock().unwrap();
        let should_remove = match slots.get(key) {
            Some(per_slot) => {
                let guard = per_slot.lock().unwrap();
                match &*guard {
                    Slot::Ready(segment) => Arc::strong_count(segment) <= 1,
                    Slot::Building => false,
                }
            }
            None => false,
        };
        if should_remove {
            slots.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
