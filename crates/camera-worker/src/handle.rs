//! The Worker mutex (§5) and the fields it guards (§3 "Worker state").
//! `std::sync::{Mutex, Condvar}` is used here specifically — not the
//! `parking_lot` locks the ring uses — because the Worker genuinely needs
//! a condition variable to sleep on between commands, and nothing else in
//! this codebase's dependency set provides one without dragging in an
//! async runtime.

use camera_core::{Command, Config, RunState};
use camera_device::Device;
use camera_ring::FrameRing;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Everything the Worker mutex guards: pending command, observed state,
/// buffer count, frame timeout, frame/timeout counters, the configuration
/// mirror, and the last fatal error (if the Worker has shut down).
pub struct SharedState {
    pub command: Command,
    pub state: RunState,
    pub nbufs: u32,
    pub frame_timeout_s: f64,
    pub frames: u64,
    pub timeouts: u64,
    pub config: Config,
    pub fatal_error: Option<String>,
}

/// Cross-thread handle shared by the Worker thread, the Controller, and
/// (read-only) queries. Cheap to clone via `Arc`.
pub struct WorkerHandle {
    state: Mutex<SharedState>,
    condvar: Condvar,
    debug: AtomicBool,
    pub ring: FrameRing,
    pub sensor_width: u32,
    pub sensor_height: u32,
    pub supported_depths: Vec<u32>,
    /// The device handle, shared with whoever else needs it while the
    /// Worker is quiescent (the Controller's config reconciler). Plain
    /// `parking_lot::Mutex` here, not the condvar-backed Worker mutex:
    /// device access is already serialized by the Worker-mutex-held
    /// quiescent check one level up, this lock only exists so the
    /// borrow checker has a legal way to share the `Box<dyn Device>`.
    pub device: Arc<parking_lot::Mutex<Box<dyn Device>>>,
}

impl WorkerHandle {
    /// `ring` must already be `FrameRing::create`d with the device's
    /// current configuration — that ring-lock-guarded copy is the single
    /// source of truth this handle's own mirror is seeded from, so a
    /// freshly spawned Worker and a freshly attached external reader
    /// never start out disagreeing.
    pub fn new(
        device: Box<dyn Device>,
        nbufs: u32,
        frame_timeout_s: f64,
        ring: FrameRing,
        sensor_width: u32,
        sensor_height: u32,
        supported_depths: Vec<u32>,
    ) -> Self {
        let initial_config = ring.lock_ring().config.clone();
        WorkerHandle {
            state: Mutex::new(SharedState {
                command: Command::None,
                state: RunState::Sleeping,
                nbufs,
                frame_timeout_s,
                frames: 0,
                timeouts: 0,
                config: initial_config,
                fatal_error: None,
            }),
            condvar: Condvar::new(),
            debug: AtomicBool::new(false),
            ring,
            sensor_width,
            sensor_height,
            supported_depths,
            device: Arc::new(parking_lot::Mutex::new(device)),
        }
    }

    /// Acquire the Worker mutex. Dropping the returned guard is the
    /// "unlock".
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().expect("worker mutex poisoned")
    }

    /// Wake the Worker thread after changing `command` under the lock.
    pub fn notify(&self) {
        self.condvar.notify_one();
    }

    /// Block on the condition variable, releasing `guard` and
    /// re-acquiring it on wake. Tolerates spurious wake-ups: callers loop
    /// on the predicate they actually care about.
    pub fn wait<'a>(&self, guard: MutexGuard<'a, SharedState>) -> MutexGuard<'a, SharedState> {
        self.condvar.wait(guard).expect("worker mutex poisoned")
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_core::{PixelEncoding, Roi};

    fn handle() -> WorkerHandle {
        let config = Config {
            roi: Roi::full_sensor(64, 64),
            x_bin: 1,
            y_bin: 1,
            exposure_time_s: 0.01,
            frame_rate_hz: 30.0,
            bit_depth: 8,
            encoding: PixelEncoding::Mono8,
            link: None,
        };
        let ring = FrameRing::create(4, 64, 64, config);
        let device = Box::new(camera_device::MockDevice::new(64, 64));
        WorkerHandle::new(device, 4, 0.1, ring, 64, 64, vec![8, 16])
    }

    #[test]
    fn new_handle_starts_sleeping_with_no_command() {
        let h = handle();
        let guard = h.lock();
        assert_eq!(guard.state, RunState::Sleeping);
        assert_eq!(guard.command, Command::None);
        assert_eq!(guard.frames, 0);
        assert_eq!(guard.timeouts, 0);
    }

    #[test]
    fn debug_flag_defaults_off_and_is_toggleable() {
        let h = handle();
        assert!(!h.debug());
        h.set_debug(true);
        assert!(h.debug());
    }
}
