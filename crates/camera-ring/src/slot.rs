//! A single frame-ring slot (§3, §4.2): one image array, its identity,
//! shape/encoding, publish counter, and timestamp, all behind one
//! `parking_lot::Mutex` so "locked" has exactly one meaning for both the
//! Worker (writer) and readers.

use crate::storage::SlotStorage;
use camera_core::{CameraError, PixelEncoding, Result, Timestamp};
use parking_lot::Mutex;

pub struct SlotInner {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) encoding: PixelEncoding,
    pub(crate) counter: u64,
    pub(crate) timestamp: Timestamp,
    storage: SlotStorage,
}

impl SlotInner {
    fn new() -> Self {
        SlotInner {
            width: 0,
            height: 0,
            encoding: PixelEncoding::Unknown,
            counter: 0,
            timestamp: Timestamp::default(),
            storage: SlotStorage::empty(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> PixelEncoding {
        self.encoding
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Resize the backing storage for a `width x height` frame in
    /// `encoding` and return the mutable destination the converter should
    /// write into. Shape/encoding are not committed to `width`/`height`/
    /// `encoding` until [`crate::FrameRing::publish`] stamps them, so a
    /// reader holding this slot's previous content never observes a
    /// shape/data mismatch.
    pub fn prepare_for_write(&mut self, width: u32, height: u32, encoding: PixelEncoding) -> Result<&mut [u8]> {
        let bpp = encoding
            .bytes_per_pixel()
            .ok_or_else(|| CameraError::BadValue {
                key: "encoding".into(),
                msg: "cannot allocate a slot for an unknown encoding".into(),
            })?;
        let bytes = camera_core::limits::frame_byte_size(width, height, bpp)?;
        self.storage.ensure_capacity(bytes)?;
        Ok(self.storage.as_mut_slice())
    }
}

/// One ring slot: a stable identity plus the mutex-guarded contents.
pub struct Slot {
    pub(crate) id: u64,
    pub(crate) inner: Mutex<SlotInner>,
}

impl Slot {
    pub(crate) fn new(id: u64) -> Self {
        Slot {
            id,
            inner: Mutex::new(SlotInner::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Try to lock this slot without blocking; used by `fetch_next_slot`
    /// to find a slot no reader currently holds.
    pub(crate) fn try_lock(&self) -> Option<parking_lot::MutexGuard<'_, SlotInner>> {
        self.inner.try_lock()
    }

    /// Lock this slot, blocking until available. Used by readers and, in
    /// the final publish step, by the Worker itself.
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, SlotInner> {
        self.inner.lock()
    }
}
