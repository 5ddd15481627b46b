//! The Worker thread's run loop (§4.4): the acquisition state machine.

use crate::handle::{SharedState, WorkerHandle};
use camera_core::{CameraError, Command, RunState, Timestamp};
use camera_device::{RawBuffer, WaitOutcome};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub(crate) struct WorkerContext {
    handle: Arc<WorkerHandle>,
    exit_requested: bool,
}

impl WorkerContext {
    pub(crate) fn new(handle: Arc<WorkerHandle>) -> Self {
        WorkerContext {
            handle,
            exit_requested: false,
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            let state = self.handle.lock().state;
            match state {
                RunState::Sleeping => self.run_sleeping(),
                RunState::Starting => self.run_starting(),
                RunState::Acquiring => self.run_acquiring(),
                RunState::Stopping | RunState::Aborting => self.run_quiescing(),
                RunState::Done => break,
            }
        }
        info!("worker thread exiting");
    }

    fn run_sleeping(&mut self) {
        if self.exit_requested {
            let mut guard = self.handle.lock();
            Self::set_state(&self.handle, &mut guard, RunState::Done);
            return;
        }
        let mut guard = self.handle.lock();
        loop {
            match guard.command {
                Command::None => {
                    guard = self.handle.wait(guard);
                }
                Command::Start => {
                    guard.command = Command::None;
                    Self::set_state(&self.handle, &mut guard, RunState::Starting);
                    info!("worker: SLEEPING -> STARTING");
                    return;
                }
                Command::Stop | Command::Abort => {
                    guard.command = Command::None;
                    return;
                }
                Command::Exit => {
                    guard.command = Command::None;
                    Self::set_state(&self.handle, &mut guard, RunState::Done);
                    info!("worker: SLEEPING -> DONE");
                    return;
                }
            }
        }
    }

    fn run_starting(&mut self) {
        let nbufs = self.handle.lock().nbufs;
        let result = self.handle.device.lock().start_acquisition(nbufs);
        match result {
            Ok(()) => {
                let mut guard = self.handle.lock();
                Self::observe_and_transition(
                    &self.handle,
                    &mut self.exit_requested,
                    &mut guard,
                    RunState::Acquiring,
                );
            }
            Err(e) => self.fatal(e),
        }
    }

    fn run_acquiring(&mut self) {
        let timeout_s = self.handle.lock().frame_timeout_s;
        let result = self
            .handle
            .device
            .lock()
            .wait_buffer(Duration::from_secs_f64(timeout_s.max(0.0)));
        match result {
            Ok(WaitOutcome::Timeout) => {
                let mut guard = self.handle.lock();
                guard.timeouts += 1;
                Self::observe_and_transition(
                    &self.handle,
                    &mut self.exit_requested,
                    &mut guard,
                    RunState::Acquiring,
                );
            }
            Ok(WaitOutcome::Buffer(buf)) => self.handle_buffer(buf),
            Err(e) => self.fatal(e),
        }
    }

    fn handle_buffer(&mut self, buf: RawBuffer) {
        let timestamp = Timestamp::now();
        let abort_pending = self.handle.lock().command == Command::Abort;

        let keep_going = if abort_pending {
            true
        } else {
            self.process_frame(&buf, timestamp)
        };
        if !keep_going {
            return; // fatal already reported; device considered unusable
        }

        let queue_result = self.handle.device.lock().queue_buffer(buf);
        if let Err(e) = queue_result {
            self.fatal(e);
            return;
        }

        let mut guard = self.handle.lock();
        Self::observe_and_transition(
            &self.handle,
            &mut self.exit_requested,
            &mut guard,
            RunState::Acquiring,
        );
    }

    /// Steps 3-4 of §4.4's frame processing: obtain a slot, convert into
    /// it, publish. Returns `false` if a fatal error was raised (the
    /// caller must not perform any further device I/O).
    fn process_frame(&mut self, buf: &RawBuffer, timestamp: Timestamp) -> bool {
        let config = self.handle.lock().config.clone();
        let width = (config.roi.width / config.x_bin.max(1)).max(1);
        let height = (config.roi.height / config.y_bin.max(1)).max(1);

        let slot_result = {
            let mut meta = self.handle.ring.lock_ring();
            self.handle.ring.fetch_next_slot(&mut meta)
        };
        let slot = match slot_result {
            Ok(s) => s,
            Err(e) => {
                self.fatal(e);
                return false;
            }
        };

        let mut guard = slot.lock();
        let dst = match guard.prepare_for_write(width, height, config.encoding) {
            Ok(d) => d,
            Err(e) => {
                drop(guard);
                self.fatal(e);
                return false;
            }
        };

        let src = unsafe { buf.as_slice() };
        match camera_convert::convert(
            src,
            buf.stride_bytes(),
            width,
            height,
            buf.source_encoding(),
            dst,
            config.encoding,
        ) {
            Ok(()) => {
                drop(guard);
                let counter = self.handle.ring.publish(&slot, width, height, config.encoding, timestamp);
                self.handle.lock().frames += 1;
                debug!(counter, width, height, "published frame");
            }
            Err(e) => {
                drop(guard);
                warn!(error = %e, "pixel conversion failed; frame dropped, buffer still requeued");
            }
        }
        true
    }

    /// Apply the command-observation rules common to the end of every
    /// device call: a redundant START collapses, STOP/ABORT move to the
    /// matching quiescing state, EXIT is remembered and takes priority.
    fn observe_and_transition(
        handle: &Arc<WorkerHandle>,
        exit_requested: &mut bool,
        guard: &mut MutexGuard<'_, SharedState>,
        stay: RunState,
    ) {
        match guard.command {
            Command::None => {
                Self::set_state(handle, guard, stay);
            }
            Command::Start => {
                guard.command = Command::None;
                Self::set_state(handle, guard, stay);
            }
            Command::Stop => {
                guard.command = Command::None;
                Self::set_state(handle, guard, RunState::Stopping);
                info!("worker: -> STOPPING");
            }
            Command::Abort => {
                guard.command = Command::None;
                Self::set_state(handle, guard, RunState::Aborting);
                info!("worker: -> ABORTING");
            }
            Command::Exit => {
                guard.command = Command::None;
                *exit_requested = true;
                Self::set_state(handle, guard, RunState::Stopping);
                info!("worker: EXIT observed, draining to SLEEPING then DONE");
            }
        }
    }

    fn run_quiescing(&mut self) {
        let result = self.handle.device.lock().stop_acquisition();
        if let Err(e) = result {
            self.fatal(e);
            return;
        }
        let mut guard = self.handle.lock();
        guard.command = Command::None;
        let next = if self.exit_requested {
            RunState::Done
        } else {
            RunState::Sleeping
        };
        Self::set_state(&self.handle, &mut guard, next);
        info!(next = %guard.state, "worker: quiesced");
    }

    fn fatal(&mut self, err: CameraError) {
        error!(error = %err, "fatal worker error; stopping device and shutting down");
        let _ = self.handle.device.lock().stop_acquisition();
        let mut guard = self.handle.lock();
        guard.fatal_error = Some(err.to_string());
        Self::set_state(&self.handle, &mut guard, RunState::Done);
    }

    /// Set the Worker mutex's state and mirror it onto the frame ring's
    /// own state field (§3), which an attached external reader observes
    /// independently of any Controller query.
    fn set_state(handle: &Arc<WorkerHandle>, guard: &mut MutexGuard<'_, SharedState>, state: RunState) {
        guard.state = state;
        handle.ring.sensor_state_set(state);
    }
}
