//! Hard limits preventing unbounded allocation, mirroring the caps this
//! codebase keeps on frame/response sizes.

/// Hard ceiling on ring growth (§4.2): `fetch_next_slot` may grow the ring
/// beyond its base capacity but never past this multiple of it.
pub const RING_HARD_MAX_MULTIPLIER: usize = 4;

/// Largest sensor dimension the ring/converter will allocate for.
pub const MAX_FRAME_DIMENSION: u32 = 65_536;

/// Largest single frame buffer, in bytes.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Validate and compute the byte size of a frame, guarding against
/// overflow and against unreasonably large allocations.
pub fn frame_byte_size(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize, crate::error::CameraError> {
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(crate::error::CameraError::OutOfRange {
            key: "roi".into(),
            msg: format!("{width}x{height} exceeds maximum dimension {MAX_FRAME_DIMENSION}"),
        });
    }
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| crate::error::CameraError::NoMemory("pixel count overflow".into()))?;
    let bytes = pixels
        .checked_mul(bytes_per_pixel)
        .ok_or_else(|| crate::error::CameraError::NoMemory("byte size overflow".into()))?;
    if bytes > MAX_FRAME_BYTES {
        return Err(crate::error::CameraError::NoMemory(format!(
            "{bytes} bytes exceeds maximum frame size {MAX_FRAME_BYTES}"
        )));
    }
    Ok(bytes)
}
