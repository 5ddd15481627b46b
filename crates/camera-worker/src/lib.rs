//! The acquisition Worker (C4): a dedicated OS thread running the state
//! machine in §4.4, plus the [`WorkerHandle`] the Controller and queries
//! use to drive and observe it.

mod context;
mod handle;

pub use handle::{SharedState, WorkerHandle};

use camera_device::Device;
use camera_ring::FrameRing;
use context::WorkerContext;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Default values mirrored from `ServerSettings` (§8.2): 4 buffers, a
/// 0.1s frame-wait timeout.
pub const DEFAULT_NBUFS: u32 = 4;
pub const DEFAULT_FRAME_TIMEOUT_S: f64 = 0.1;

/// Owns the Worker's OS thread. Dropping a `Worker` does not stop the
/// thread; call `join` after sending `Command::Exit` through the handle.
pub struct Worker {
    handle: Arc<WorkerHandle>,
    join_handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the Worker thread. `device` should already be open, and
    /// `ring` must already be `FrameRing::create`d with `device`'s current
    /// configuration — that is the one place the initial configuration
    /// mirror comes from, shared by the Worker handle and the ring.
    pub fn spawn(
        device: Box<dyn Device>,
        ring: FrameRing,
        sensor_width: u32,
        sensor_height: u32,
        supported_depths: Vec<u32>,
    ) -> Self {
        Self::spawn_with(
            device,
            ring,
            sensor_width,
            sensor_height,
            supported_depths,
            DEFAULT_NBUFS,
            DEFAULT_FRAME_TIMEOUT_S,
        )
    }

    pub fn spawn_with(
        device: Box<dyn Device>,
        ring: FrameRing,
        sensor_width: u32,
        sensor_height: u32,
        supported_depths: Vec<u32>,
        nbufs: u32,
        frame_timeout_s: f64,
    ) -> Self {
        let handle = Arc::new(WorkerHandle::new(
            device,
            nbufs,
            frame_timeout_s,
            ring,
            sensor_width,
            sensor_height,
            supported_depths,
        ));
        let ctx = WorkerContext::new(handle.clone());
        let join_handle = std::thread::Builder::new()
            .name("camera-worker".into())
            .spawn(move || ctx.run())
            .expect("failed to spawn worker thread");
        Worker {
            handle,
            join_handle: Some(join_handle),
        }
    }

    pub fn handle(&self) -> &Arc<WorkerHandle> {
        &self.handle
    }

    /// Block until the Worker thread reports DONE and exits. Typically
    /// called after sending `Command::Exit`.
    pub fn join(mut self) {
        if let Some(jh) = self.join_handle.take() {
            let _ = jh.join();
        }
    }
}
