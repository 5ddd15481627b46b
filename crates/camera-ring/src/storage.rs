//! Backing storage for one slot's pixel data: a `memmap2`-mapped
//! temp-file-backed region, grown (re-mapped) on demand. Using a real
//! file-backed mapping rather than a `Vec<u8>` keeps a slot's bytes in
//! genuine shared memory, which is what lets the `shmid` query hand an
//! external reader process something to attach.

use camera_core::{CameraError, Result};
use memmap2::MmapMut;
use std::fs::File;

pub struct SlotStorage {
    file: Option<File>,
    map: Option<MmapMut>,
    len: usize,
}

impl SlotStorage {
    pub fn empty() -> Self {
        SlotStorage {
            file: None,
            map: None,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    /// Grow (or first-allocate) the mapping to at least `bytes`. No-op if
    /// already large enough. Existing pixel content is not preserved
    /// across a grow; callers always overwrite the full frame before
    /// publishing.
    pub fn ensure_capacity(&mut self, bytes: usize) -> Result<()> {
        if self.capacity() >= bytes {
            self.len = bytes;
            return Ok(());
        }
        let file = tempfile::tempfile().map_err(|e| {
            CameraError::NoMemory(format!("could not create slot backing file: {e}"))
        })?;
        file.set_len(bytes as u64)
            .map_err(|e| CameraError::NoMemory(format!("could not size slot backing file: {e}")))?;
        // SAFETY: `file` is privately owned by this `SlotStorage` and not
        // shared with any other mapping; it is not truncated or reopened
        // elsewhere while mapped.
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| CameraError::NoMemory(format!("could not map slot storage: {e}")))?;
        self.file = Some(file);
        self.map = Some(map);
        self.len = bytes;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.map {
            Some(m) => &m[..self.len],
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(m) => &mut m[..self.len],
            None => &mut [],
        }
    }
}
