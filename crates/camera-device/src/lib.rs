//! The device abstraction (C1): a vendor-agnostic capability to start/stop
//! a stream, dequeue/requeue buffers, and read/apply a configuration
//! record. The concrete vendor SDK binding is an external collaborator;
//! this crate defines only the trait and a synthetic [`mock::MockDevice`]
//! used by the rest of the core for tests and for `camera-server` when no
//! hardware driver is linked.

pub mod buffer;
pub mod mock;

use camera_core::{Config, Result};
use std::time::Duration;

pub use buffer::RawBuffer;
pub use mock::MockDevice;

/// Outcome of a [`Device::wait_buffer`] call: a frame arrived, or the
/// requested timeout elapsed first. Distinct from `Err`, which means the
/// device itself failed.
#[derive(Debug)]
pub enum WaitOutcome {
    Timeout,
    Buffer(RawBuffer),
}

/// Uniform capability over a scientific camera, per §4.1.
///
/// Every method is a blocking call made from the Worker thread; none of
/// them may be called re-entrantly (the Worker serializes all device
/// access by construction, never holding the device handle from more than
/// one thread at a time).
pub trait Device: Send {
    /// Open the device at the given index. Must be called before any other
    /// method except `sensor_geometry` on a device that pre-populates it.
    fn open(&mut self, index: u32) -> Result<()>;

    /// Close the device, releasing hardware resources. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Read the device's current configuration. Always succeeds on an open
    /// device; this is the source of truth the mirror is refreshed from.
    fn get_configuration(&self) -> Result<Config>;

    /// Apply a configuration. Fails with `BadValue`/`OutOfRange` if any
    /// field is rejected. Partial application is allowed; the returned
    /// record reflects what was actually applied (device-coerced values
    /// included), not what was requested.
    fn set_configuration(&mut self, requested: &Config) -> Result<Config>;

    /// Start streaming with `nbufs` device-owned DMA buffers. Only valid
    /// from a quiescent device state; calling it while running is
    /// `InvalidState`.
    fn start_acquisition(&mut self, nbufs: u32) -> Result<()>;

    /// Stop streaming. Valid from any running state.
    fn stop_acquisition(&mut self) -> Result<()>;

    /// Block for at most `timeout` waiting for the next frame. Delivery
    /// ordering is FIFO with respect to device exposure order.
    fn wait_buffer(&mut self, timeout: Duration) -> Result<WaitOutcome>;

    /// Return a previously dequeued buffer to the device's DMA ring so it
    /// can be reused for a future frame.
    fn queue_buffer(&mut self, buffer: RawBuffer) -> Result<()>;

    /// Sensor geometry (width, height), immutable after open.
    fn sensor_geometry(&self) -> (u32, u32);

    /// Read the current sensor temperature in degrees Celsius.
    fn update_temperature(&mut self) -> Result<f64>;
}
