//! The process-wide shared frame ring (C2): a fixed-capacity (growable up
//! to a hard maximum) sequence of [`Slot`]s, each independently lockable,
//! plus ring-level metadata (sensor geometry, configuration mirror,
//! run state, most-recent counter) guarded by one ring lock.
//!
//! Lock order is Worker mutex → ring lock → slot lock, enforced here by
//! construction: [`FrameRing::publish`] is the only place that holds both
//! locks at once, and it always takes the ring lock first.

mod slot;
mod storage;

pub use slot::{Slot, SlotInner};

use camera_core::limits::RING_HARD_MAX_MULTIPLIER;
use camera_core::{CameraError, Config, PixelEncoding, Result, RunState, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Ring-level metadata: everything the ring lock guards.
pub struct RingMeta {
    pub sensor_width: u32,
    pub sensor_height: u32,
    pub config: Config,
    pub state: RunState,
    hard_max: usize,
    next_slot_id: u64,
    slots: Vec<Arc<Slot>>,
}

impl RingMeta {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn allocate_slot(&mut self) -> Arc<Slot> {
        let id = self.next_slot_id;
        self.next_slot_id += 1;
        let slot = Arc::new(Slot::new(id));
        self.slots.push(slot.clone());
        slot
    }
}

struct RingInner {
    identifier: u64,
    most_recent_counter: AtomicU64,
    meta: Mutex<RingMeta>,
}

fn registry() -> &'static Mutex<HashMap<u64, Arc<RingInner>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<RingInner>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn next_identifier() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A handle to the frame ring. Cheap to clone (an `Arc` underneath);
/// every clone and every `attach`-ed handle within the process shares the
/// same slots, counter, and metadata.
#[derive(Clone)]
pub struct FrameRing {
    inner: Arc<RingInner>,
}

impl FrameRing {
    /// Allocate a new ring with `capacity` slots, publishing an identifier
    /// other in-process handles can `attach` with.
    pub fn create(capacity: usize, sensor_width: u32, sensor_height: u32, config: Config) -> Self {
        let capacity = capacity.max(1);
        let identifier = next_identifier();
        let mut meta = RingMeta {
            sensor_width,
            sensor_height,
            config,
            state: RunState::Sleeping,
            hard_max: capacity * RING_HARD_MAX_MULTIPLIER,
            next_slot_id: 0,
            slots: Vec::with_capacity(capacity),
        };
        for _ in 0..capacity {
            meta.allocate_slot();
        }
        let inner = Arc::new(RingInner {
            identifier,
            most_recent_counter: AtomicU64::new(0),
            meta: Mutex::new(meta),
        });
        registry().lock().insert(identifier, inner.clone());
        tracing::info!(identifier, capacity, sensor_width, sensor_height, "frame ring created");
        FrameRing { inner }
    }

    /// Attach to a ring previously created in this process by identifier
    /// (the value a client would have learned from the `shmid` query).
    pub fn attach(identifier: u64) -> Result<Self> {
        registry()
            .lock()
            .get(&identifier)
            .cloned()
            .map(|inner| FrameRing { inner })
            .ok_or_else(|| CameraError::Device(format!("no frame ring with identifier {identifier}")))
    }

    pub fn identifier(&self) -> u64 {
        self.inner.identifier
    }

    pub fn most_recent_counter(&self) -> u64 {
        self.inner.most_recent_counter.load(Ordering::Acquire)
    }

    /// Acquire the ring lock. Dropping the returned guard releases it.
    pub fn lock_ring(&self) -> parking_lot::MutexGuard<'_, RingMeta> {
        self.inner.meta.lock()
    }

    /// Set the exposed run state, taking the ring lock for the duration.
    pub fn sensor_state_set(&self, state: RunState) {
        self.inner.meta.lock().state = state;
    }

    pub fn state(&self) -> RunState {
        self.inner.meta.lock().state
    }

    /// Pick the slot the Worker should write the next frame into: the
    /// oldest (by publish counter) slot no reader currently holds. If
    /// every existing slot is locked, the ring grows up to its hard
    /// maximum; beyond that, the globally oldest slot is evicted (its
    /// current reader, if any, is waited on).
    ///
    /// Caller must already hold the ring lock; `meta` is that guard's
    /// contents.
    pub fn fetch_next_slot(&self, meta: &mut RingMeta) -> Result<Arc<Slot>> {
        if meta.slots.is_empty() {
            return Ok(meta.allocate_slot());
        }

        let mut best: Option<(usize, u64)> = None;
        for (i, slot) in meta.slots.iter().enumerate() {
            if let Some(guard) = slot.try_lock() {
                let counter = guard.counter();
                drop(guard);
                if best.map_or(true, |(_, c)| counter < c) {
                    best = Some((i, counter));
                }
            }
        }
        if let Some((i, _)) = best {
            return Ok(meta.slots[i].clone());
        }

        if meta.slots.len() < meta.hard_max {
            let slot = meta.allocate_slot();
            tracing::warn!(new_capacity = meta.slots.len(), hard_max = meta.hard_max, "frame ring grew beyond base capacity; all slots were reader-locked");
            return Ok(slot);
        }

        let (idx, oldest_counter) = meta
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.lock().counter()))
            .min_by_key(|(_, c)| *c)
            .ok_or_else(|| CameraError::NoMemory("frame ring has no slots to evict".into()))?;
        tracing::warn!(idx, oldest_counter, hard_max = meta.hard_max, "frame ring at hard maximum; evicting oldest slot under reader contention");
        Ok(meta.slots[idx].clone())
    }

    /// Stamp `slot` with the given shape/encoding/timestamp and make it
    /// the most-recently-published slot. Takes the ring lock for the
    /// duration (per §4.2); the slot lock is acquired and released inside
    /// that same critical section, so the lock order stays ring → slot.
    pub fn publish(&self, slot: &Arc<Slot>, width: u32, height: u32, encoding: PixelEncoding, timestamp: Timestamp) -> u64 {
        let _meta = self.inner.meta.lock();
        let counter = self.inner.most_recent_counter.fetch_add(1, Ordering::AcqRel) + 1;
        let mut guard = slot.lock();
        guard.width = width;
        guard.height = height;
        guard.encoding = encoding;
        guard.counter = counter;
        guard.timestamp = timestamp;
        counter
    }

    /// Read the most recently published frame, following the double-check
    /// protocol from §4.2: lock ring, read counter, find the slot holding
    /// it, release the ring lock, lock the slot, read, release.
    pub fn read_latest(&self) -> Option<FrameSnapshot> {
        let target_slot = {
            let meta = self.inner.meta.lock();
            let k = self.most_recent_counter();
            if k == 0 {
                return None;
            }
            meta.slots.iter().find(|s| s.lock().counter() == k).cloned()
        };
        let slot = target_slot?;
        let guard = slot.lock();
        Some(FrameSnapshot {
            counter: guard.counter(),
            width: guard.width(),
            height: guard.height(),
            encoding: guard.encoding(),
            timestamp: guard.timestamp(),
            data: guard.data().to_vec(),
        })
    }
}

/// An owned, consistent copy of one published frame, the shape a reader
/// actually gets back after the lock/read/unlock sequence.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub counter: u64,
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
    pub timestamp: Timestamp,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_core::{LinkParams, Roi};

    fn base_config() -> Config {
        Config {
            roi: Roi::full_sensor(4, 4),
            x_bin: 1,
            y_bin: 1,
            exposure_time_s: 0.01,
            frame_rate_hz: 10.0,
            bit_depth: 8,
            encoding: PixelEncoding::Mono8,
            link: None::<LinkParams>,
        }
    }

    #[test]
    fn attach_shares_state_with_creator() {
        let ring = FrameRing::create(4, 640, 480, base_config());
        let attached = FrameRing::attach(ring.identifier()).unwrap();
        ring.sensor_state_set(RunState::Acquiring);
        assert_eq!(attached.state(), RunState::Acquiring);
    }

    #[test]
    fn attach_unknown_identifier_fails() {
        assert!(FrameRing::attach(u64::MAX).is_err());
    }

    #[test]
    fn publish_then_read_latest_round_trips_bytes() {
        let ring = FrameRing::create(4, 4, 4, base_config());
        let slot = {
            let mut meta = ring.lock_ring();
            ring.fetch_next_slot(&mut meta).unwrap()
        };
        {
            let mut guard = slot.lock();
            let dst = guard.prepare_for_write(4, 4, PixelEncoding::Mono8).unwrap();
            for (i, b) in dst.iter_mut().enumerate() {
                *b = i as u8;
            }
        }
        let counter = ring.publish(&slot, 4, 4, PixelEncoding::Mono8, Timestamp::now());
        assert_eq!(counter, 1);

        let snapshot = ring.read_latest().unwrap();
        assert_eq!(snapshot.counter, 1);
        assert_eq!(snapshot.data, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn counters_strictly_increase_across_publishes() {
        let ring = FrameRing::create(2, 2, 2, base_config());
        let mut last = 0;
        for _ in 0..5 {
            let slot = {
                let mut meta = ring.lock_ring();
                ring.fetch_next_slot(&mut meta).unwrap()
            };
            {
                let mut guard = slot.lock();
                guard.prepare_for_write(2, 2, PixelEncoding::Mono8).unwrap();
            }
            let counter = ring.publish(&slot, 2, 2, PixelEncoding::Mono8, Timestamp::now());
            assert!(counter > last);
            last = counter;
        }
    }

    #[test]
    fn fetch_next_slot_grows_when_all_slots_are_reader_locked() {
        let ring = FrameRing::create(1, 2, 2, base_config());
        let slot = {
            let mut meta = ring.lock_ring();
            ring.fetch_next_slot(&mut meta).unwrap()
        };
        let _reader_guard = slot.lock(); // hold the only slot locked

        let mut meta = ring.lock_ring();
        let grown = ring.fetch_next_slot(&mut meta).unwrap();
        assert_ne!(grown.id(), slot.id());
        assert_eq!(meta.capacity(), 2);
    }
}
