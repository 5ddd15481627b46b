//! The raw DMA buffer handle exchanged between [`crate::Device`] and the
//! worker. Mirrors the ptr+len contract a vendor SDK hands back from its
//! own frame buffer pool: the memory is owned by the device (or by
//! [`crate::MockDevice`]'s internal pool), not by the caller, and remains
//! valid only until it is queued back with `Device::queue_buffer`.

use camera_core::PixelEncoding;

/// A frame buffer on loan from the device. Not `Clone`: a buffer is
/// consumed exactly once, either read and requeued, or dropped with the
/// device responsible for eventual reuse.
///
/// Carries its own encoding and row pitch because a device's native DMA
/// layout is not required to match the configuration mirror's published
/// `encoding` — a sensor's raw ADC output is frequently a different bit
/// depth (or, on real hardware, a different Bayer/mono arrangement) than
/// whatever the mirror currently advertises to consumers, and padding
/// hardware adds between rows has nothing to do with the mirror either.
#[derive(Debug)]
pub struct RawBuffer {
    ptr: *const u8,
    len: usize,
    /// Opaque handle the device uses to find this buffer's slot again on
    /// `queue_buffer`; meaningless to callers.
    token: usize,
    source_encoding: PixelEncoding,
    stride_bytes: usize,
}

impl RawBuffer {
    /// Construct a buffer view over device-owned memory. The caller
    /// guarantees `ptr` is valid for reads of `len` bytes for as long as
    /// the `RawBuffer` is alive and has not yet been passed to
    /// `queue_buffer`. `source_encoding`/`stride_bytes` describe the bytes
    /// actually present at `ptr`, independent of any configuration
    /// mirror's `encoding`.
    ///
    /// # Safety
    /// `ptr` must point to at least `len` initialized, readable bytes,
    /// and that memory must not be mutated or freed while this value is
    /// alive.
    pub unsafe fn new(
        ptr: *const u8,
        len: usize,
        token: usize,
        source_encoding: PixelEncoding,
        stride_bytes: usize,
    ) -> Self {
        RawBuffer {
            ptr,
            len,
            token,
            source_encoding,
            stride_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn token(&self) -> usize {
        self.token
    }

    /// The encoding of the bytes this buffer actually holds, as reported
    /// by the device — may differ from a configuration mirror's
    /// `encoding`, which is what the converter is asked to produce.
    pub fn source_encoding(&self) -> PixelEncoding {
        self.source_encoding
    }

    /// Row pitch in bytes, which may exceed `width * source_encoding`'s
    /// bytes-per-pixel to account for hardware row padding.
    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    /// View the buffer's bytes.
    ///
    /// # Safety
    /// The underlying memory must still be valid; callers must not retain
    /// the slice past the point where the buffer is queued back to the
    /// device.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

// SAFETY: RawBuffer is handed off exactly once from the device thread to
// the worker thread (never shared), so the raw pointer crossing threads
// is sound provided the Device contract (exclusive access until requeue)
// is upheld by the caller.
unsafe impl Send for RawBuffer {}
