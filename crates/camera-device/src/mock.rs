//! A synthetic [`Device`] used by tests and by `camera-server` when no
//! vendor driver is linked in. Generates the same `(x + y) % 256`
//! checkerboard pattern this codebase has long used to sanity-check frame
//! plumbing end to end without real hardware attached.

use crate::{Device, RawBuffer, WaitOutcome};
use camera_core::{CameraError, Config, PixelEncoding, Result, Roi};
use std::time::Duration;
use tracing::{debug, trace};

/// This mock's simulated sensor always delivers raw 16-bit ADC samples,
/// regardless of what encoding the configuration mirror currently
/// publishes — exercising the same mirror-independent conversion path a
/// real vendor SDK would need (its hardware format rarely matches
/// whatever output encoding a client last requested).
const NATIVE_ENCODING: PixelEncoding = PixelEncoding::Mono16;

/// Extra bytes of row padding the simulated DMA hardware adds, so the
/// converter's stride handling is actually exercised by a real (if
/// synthetic) acquisition instead of only by its own unit tests.
const ROW_PADDING_BYTES: usize = 8;

/// One pre-allocated DMA-style buffer. Stays at a fixed heap address for
/// its lifetime so pointers handed out via [`RawBuffer`] stay valid across
/// pool growth, the same stable-address discipline the rest of this
/// codebase's pool types rely on.
struct Slot {
    data: Box<[u8]>,
    in_flight: bool,
}

/// Deterministic, allocation-cheap stand-in for a vendor SDK binding.
///
/// Frames are delivered immediately (no real-time pacing) so tests run
/// fast; a handful of `force_*`/`fail_*` knobs let tests drive the worker
/// through its error and timeout paths without real hardware faults.
pub struct MockDevice {
    opened: bool,
    config: Config,
    sensor_width: u32,
    sensor_height: u32,
    running: bool,
    slots: Vec<Slot>,
    next_frame: u64,
    temperature_c: f64,

    force_timeout: bool,
    fail_next_start: bool,
    fail_next_stop: bool,
    fail_next_queue: bool,
    fail_next_set_configuration: bool,
}

impl MockDevice {
    pub fn new(sensor_width: u32, sensor_height: u32) -> Self {
        let roi = Roi::full_sensor(sensor_width, sensor_height);
        MockDevice {
            opened: false,
            config: Config {
                roi,
                x_bin: 1,
                y_bin: 1,
                exposure_time_s: 0.01,
                frame_rate_hz: 100.0,
                bit_depth: 8,
                encoding: PixelEncoding::Mono8,
                link: None,
            },
            sensor_width,
            sensor_height,
            running: false,
            slots: Vec::new(),
            next_frame: 0,
            temperature_c: -20.0,
            force_timeout: false,
            fail_next_start: false,
            fail_next_stop: false,
            fail_next_queue: false,
            fail_next_set_configuration: false,
        }
    }

    /// Next `wait_buffer` call returns `WaitOutcome::Timeout` regardless of
    /// whether a frame would otherwise be ready.
    pub fn force_next_timeout(&mut self) {
        self.force_timeout = true;
    }

    pub fn fail_next_start(&mut self) {
        self.fail_next_start = true;
    }

    pub fn fail_next_stop(&mut self) {
        self.fail_next_stop = true;
    }

    pub fn fail_next_queue(&mut self) {
        self.fail_next_queue = true;
    }

    pub fn fail_next_set_configuration(&mut self) {
        self.fail_next_set_configuration = true;
    }

    /// `(width, height, row stride in bytes)` of the frames this device
    /// currently hands out, in its own native encoding — independent of
    /// `self.config.encoding`, which is only the mirror's published
    /// output encoding.
    fn native_geometry(&self) -> (u32, u32, usize) {
        let w = (self.config.roi.width / self.config.x_bin.max(1)).max(1);
        let h = (self.config.roi.height / self.config.y_bin.max(1)).max(1);
        let bpp = NATIVE_ENCODING.bytes_per_pixel().unwrap_or(2);
        let stride = w as usize * bpp + ROW_PADDING_BYTES;
        (w, h, stride)
    }

    fn frame_byte_len(&self) -> usize {
        let (_, h, stride) = self.native_geometry();
        stride * h as usize
    }

    fn fill_synthetic_frame_into(buf: &mut [u8], w: u32, h: u32, stride: usize) {
        for y in 0..h {
            for x in 0..w {
                let value = ((x + y) % 65536) as u16;
                let offset = y as usize * stride + x as usize * 2;
                if offset + 2 <= buf.len() {
                    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}

impl Device for MockDevice {
    fn open(&mut self, _index: u32) -> Result<()> {
        self.opened = true;
        debug!(width = self.sensor_width, height = self.sensor_height, "mock device opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        self.running = false;
        self.slots.clear();
        Ok(())
    }

    fn get_configuration(&self) -> Result<Config> {
        if !self.opened {
            return Err(CameraError::InvalidState);
        }
        Ok(self.config.clone())
    }

    fn set_configuration(&mut self, requested: &Config) -> Result<Config> {
        if !self.opened {
            return Err(CameraError::InvalidState);
        }
        if self.fail_next_set_configuration {
            self.fail_next_set_configuration = false;
            return Err(CameraError::BadValue {
                key: "configuration".into(),
                msg: "injected failure".into(),
            });
        }
        requested.validate(self.sensor_width, self.sensor_height, &[8, 10, 12, 16])?;
        self.config = requested.clone();
        Ok(self.config.clone())
    }

    fn start_acquisition(&mut self, nbufs: u32) -> Result<()> {
        if !self.opened {
            return Err(CameraError::InvalidState);
        }
        if self.running {
            return Err(CameraError::InvalidState);
        }
        if self.fail_next_start {
            self.fail_next_start = false;
            return Err(CameraError::Device("simulated start failure".into()));
        }
        let frame_len = self.frame_byte_len();
        self.slots = (0..nbufs.max(1))
            .map(|_| Slot {
                data: vec![0u8; frame_len].into_boxed_slice(),
                in_flight: false,
            })
            .collect();
        self.running = true;
        self.next_frame = 0;
        trace!(nbufs, frame_len, "mock acquisition started");
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<()> {
        if self.fail_next_stop {
            self.fail_next_stop = false;
            return Err(CameraError::Device("simulated stop failure".into()));
        }
        self.running = false;
        for slot in &mut self.slots {
            slot.in_flight = false;
        }
        Ok(())
    }

    fn wait_buffer(&mut self, _timeout: Duration) -> Result<WaitOutcome> {
        if !self.running {
            return Err(CameraError::InvalidState);
        }
        if self.force_timeout {
            self.force_timeout = false;
            return Ok(WaitOutcome::Timeout);
        }
        let idx = (self.next_frame as usize) % self.slots.len().max(1);
        self.next_frame += 1;
        let frame_len = self.frame_byte_len();
        let (w, h, stride_bytes) = self.native_geometry();
        let slot = self
            .slots
            .get_mut(idx)
            .ok_or_else(|| CameraError::Device("no buffers allocated".into()))?;
        if slot.data.len() != frame_len {
            slot.data = vec![0u8; frame_len].into_boxed_slice();
        }
        MockDevice::fill_synthetic_frame_into(&mut slot.data, w, h, stride_bytes);
        slot.in_flight = true;
        let ptr = slot.data.as_ptr();
        let len = slot.data.len();
        // SAFETY: `slot.data` is a stable-address boxed allocation owned by
        // this device for as long as the returned RawBuffer is outstanding;
        // the caller is expected to requeue it via `queue_buffer` before the
        // device is closed or the slot is reused.
        Ok(WaitOutcome::Buffer(unsafe {
            RawBuffer::new(ptr, len, idx, NATIVE_ENCODING, stride_bytes)
        }))
    }

    fn queue_buffer(&mut self, buffer: RawBuffer) -> Result<()> {
        if self.fail_next_queue {
            self.fail_next_queue = false;
            return Err(CameraError::Device("simulated queue failure".into()));
        }
        let idx = buffer.token();
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.in_flight = false;
        }
        Ok(())
    }

    fn sensor_geometry(&self) -> (u32, u32) {
        (self.sensor_width, self.sensor_height)
    }

    fn update_temperature(&mut self) -> Result<f64> {
        if !self.opened {
            return Err(CameraError::InvalidState);
        }
        self.temperature_c += 0.0;
        Ok(self.temperature_c)
    }
}
