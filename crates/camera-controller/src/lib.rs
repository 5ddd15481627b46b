//! The request dispatcher (C5): turns parsed [`request::Request`]s into
//! Worker-mutex-guarded state changes or [`camera_reconcile`] calls, and
//! query responses into text lines.
//!
//! The line transport itself (reading lines off a socket or stdin) is an
//! external collaborator; this crate only implements `dispatch`.

mod request;

pub use request::{parse, Query, Request};

use camera_core::{CameraError, Command, RunState, Timestamp};
use camera_worker::WorkerHandle;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// How long the Controller sleeps between retries of a configuration
/// mutation while the Worker is STOPPING/ABORTING (§5 "Controller ...
/// short sleep while retrying").
const CONFIG_RETRY_SLEEP: Duration = Duration::from_millis(1);

/// Dispatches parsed requests against one Worker. Cheap to clone: holds
/// only the `Arc<WorkerHandle>` the Worker itself was spawned with.
#[derive(Clone)]
pub struct Controller {
    handle: Arc<WorkerHandle>,
}

impl Controller {
    pub fn new(handle: Arc<WorkerHandle>) -> Self {
        Controller { handle }
    }

    /// Parse and run one request line, returning the single-line response
    /// the client sees (§6, §7 "every rejected request returns a
    /// single-line error message prefixed by the failing context").
    pub fn dispatch(&self, line: &str) -> String {
        let response = match request::parse(line) {
            Ok(req) => self.handle_request(req),
            Err(e) => e.with_context("parse"),
        };
        if self.handle.debug() {
            debug!(request = line, response = %response, "controller: dispatched request");
        }
        response
    }

    fn handle_request(&self, req: Request) -> String {
        match req {
            Request::Start(nbufs) => self.handle_start(nbufs),
            Request::Stop => self.schedule(Command::Stop),
            Request::Abort => self.schedule(Command::Abort),
            Request::Quit => self.schedule(Command::Exit),
            Request::SetDebug(on) => {
                self.handle.set_debug(on);
                "ok".to_string()
            }
            Request::Config(pairs) => self.handle_config(&pairs),
            Request::Query(q) => self.handle_query(q),
        }
    }

    /// Lifecycle mutation common path (§4.5 step 3): acquire the Worker
    /// mutex, set `command`, signal, release.
    fn schedule(&self, command: Command) -> String {
        let mut guard = self.handle.lock();
        guard.command = command;
        drop(guard);
        self.handle.notify();
        "ok".to_string()
    }

    fn handle_start(&self, nbufs: Option<u32>) -> String {
        let mut guard = self.handle.lock();
        if let Some(n) = nbufs {
            if n != guard.nbufs && !guard.state.is_quiescent() {
                return CameraError::InvalidState.with_context("start");
            }
            guard.nbufs = n;
        }
        guard.command = Command::Start;
        drop(guard);
        self.handle.notify();
        "ok".to_string()
    }

    /// Configuration mutation (§4.5 step 4): loop holding the Worker mutex
    /// only while deciding; apply via C6 once quiescent; retry while
    /// draining; reject outright while actually acquiring.
    fn handle_config(&self, pairs: &[(String, String)]) -> String {
        loop {
            let mut guard = self.handle.lock();
            match expected_state(guard.command, guard.state) {
                RunState::Sleeping => {
                    let mut requested = guard.config.clone();
                    if let Err(e) = request::apply_config_pairs(&mut requested, pairs) {
                        return e.with_context("config");
                    }
                    let result = {
                        let mut device = self.handle.device.lock();
                        camera_reconcile::reconcile(
                            &mut **device,
                            &mut guard.config,
                            &requested,
                            self.handle.sensor_width,
                            self.handle.sensor_height,
                            &self.handle.supported_depths,
                        )
                    };
                    return match result {
                        Ok(()) => {
                            self.handle.ring.lock_ring().config = guard.config.clone();
                            "ok".to_string()
                        }
                        Err(e) => e.with_context("config"),
                    };
                }
                RunState::Stopping | RunState::Aborting => {
                    drop(guard);
                    thread::sleep(CONFIG_RETRY_SLEEP);
                    continue;
                }
                _ => return "cannot change settings during acquisition".to_string(),
            }
        }
    }

    fn handle_query(&self, q: Query) -> String {
        match q {
            Query::SensorWidth => self.handle.sensor_width.to_string(),
            Query::SensorHeight => self.handle.sensor_height.to_string(),
            Query::XBin => self.handle.lock().config.x_bin.to_string(),
            Query::YBin => self.handle.lock().config.y_bin.to_string(),
            Query::XOff => self.handle.lock().config.roi.x_offset.to_string(),
            Query::YOff => self.handle.lock().config.roi.y_offset.to_string(),
            Query::Width => self.handle.lock().config.roi.width.to_string(),
            Query::Height => self.handle.lock().config.roi.height.to_string(),
            Query::ExposureTime => self.handle.lock().config.exposure_time_s.to_string(),
            Query::FrameRate => self.handle.lock().config.frame_rate_hz.to_string(),
            Query::State => self.handle.lock().state.to_string(),
            Query::ShmId => self.handle.ring.identifier().to_string(),
            Query::Ping => Timestamp::now().as_secs_f64().to_string(),
            Query::Debug => if self.handle.debug() { "on" } else { "off" }.to_string(),
            Query::Roi => {
                let roi = self.handle.lock().config.roi;
                format!("{} {} {} {}", roi.x_offset, roi.y_offset, roi.width, roi.height)
            }
            Query::Temperature => match self.handle.device.lock().update_temperature() {
                Ok(t) => t.to_string(),
                Err(e) => e.with_context("temperature"),
            },
            Query::FrameCount => self.handle.lock().frames.to_string(),
            Query::TimeoutCount => self.handle.lock().timeouts.to_string(),
            Query::RingCapacity => self.handle.ring.lock_ring().capacity().to_string(),
        }
    }
}

/// The expected-state rule (§4.5): what state a configuration mutation
/// must see before it is safe to apply, computed from the state the
/// Worker currently reports plus whatever command is still pending.
fn expected_state(command: Command, state: RunState) -> RunState {
    match (state, command) {
        (_, Command::Exit) => RunState::Done,
        (RunState::Starting | RunState::Acquiring, Command::Stop) => RunState::Stopping,
        (RunState::Starting | RunState::Acquiring, Command::Abort) => RunState::Aborting,
        (other, _) => other,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use camera_device::{Device, MockDevice};
    use camera_ring::FrameRing;
    use camera_worker::Worker;

    /// Keeps the `Worker` (and therefore its thread) alive for as long as
    /// the returned `Controller`/`Arc<WorkerHandle>` are in scope.
    struct Fixture {
        controller: Controller,
        handle: Arc<WorkerHandle>,
        _worker: Worker,
    }

    fn controller(width: u32, height: u32) -> (Controller, Arc<WorkerHandle>) {
        let fixture = fixture(width, height);
        (fixture.controller, fixture.handle)
    }

    fn fixture(width: u32, height: u32) -> Fixture {
        let mut device = MockDevice::new(width, height);
        device.open(0).unwrap();
        let config = device.get_configuration().unwrap();
        let ring = FrameRing::create(4, width, height, config);
        let worker = Worker::spawn_with(Box::new(device), ring, width, height, vec![8, 10, 12, 16], 4, 0.02);
        let handle = worker.handle().clone();
        Fixture {
            controller: Controller::new(handle.clone()),
            handle,
            _worker: worker,
        }
    }

    #[test]
    fn expected_state_prioritizes_exit() {
        assert_eq!(expected_state(Command::Exit, RunState::Acquiring), RunState::Done);
    }

    #[test]
    fn expected_state_reports_stopping_under_pending_stop() {
        assert_eq!(expected_state(Command::Stop, RunState::Acquiring), RunState::Stopping);
        assert_eq!(expected_state(Command::Abort, RunState::Starting), RunState::Aborting);
    }

    #[test]
    fn expected_state_defaults_to_current_state() {
        assert_eq!(expected_state(Command::None, RunState::Sleeping), RunState::Sleeping);
    }

    #[test]
    fn ping_query_returns_a_parseable_timestamp() {
        let (c, _handle) = controller(8, 8);
        let resp = c.dispatch("ping");
        assert!(resp.parse::<f64>().is_ok());
    }

    #[test]
    fn sensor_geometry_queries_report_fixed_dimensions() {
        let (c, _handle) = controller(16, 12);
        assert_eq!(c.dispatch("sensorwidth"), "16");
        assert_eq!(c.dispatch("sensorheight"), "12");
    }

    #[test]
    fn shmid_matches_the_rings_own_identifier() {
        let (c, handle) = controller(8, 8);
        assert_eq!(c.dispatch("shmid"), handle.ring.identifier().to_string());
    }

    #[test]
    fn debug_toggle_round_trips_through_the_query() {
        let (c, _handle) = controller(8, 8);
        assert_eq!(c.dispatch("debug"), "off");
        assert_eq!(c.dispatch("debug on"), "ok");
        assert_eq!(c.dispatch("debug"), "on");
    }

    #[test]
    fn unknown_verb_reports_a_parse_context() {
        let (c, _handle) = controller(8, 8);
        assert!(c.dispatch("bogus").starts_with("parse:"));
    }

    #[test]
    fn config_while_sleeping_applies_and_is_reflected_in_queries() {
        let (c, _handle) = controller(64, 64);
        let resp = c.dispatch("config xoff 16 yoff 16 width 32 height 32 exposuretime 0.002 framerate 100");
        assert_eq!(resp, "ok");
        assert_eq!(c.dispatch("xoff"), "16");
        assert_eq!(c.dispatch("width"), "32");
    }

    #[test]
    fn config_mid_acquisition_is_rejected_without_touching_mirror() {
        let (c, handle) = controller(16, 16);
        assert_eq!(c.dispatch("start"), "ok");
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while handle.lock().state != RunState::Acquiring && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(handle.lock().state, RunState::Acquiring);

        let before = handle.lock().config.clone();
        let resp = c.dispatch("config exposuretime 0.05");
        assert_eq!(resp, "cannot change settings during acquisition");
        assert_eq!(handle.lock().config, before);

        c.dispatch("abort");
    }

    #[test]
    fn bad_config_key_is_reported_with_context() {
        let (c, _handle) = controller(8, 8);
        let resp = c.dispatch("config bogus 1");
        assert!(resp.starts_with("config:"));
    }

    #[test]
    fn starting_buffer_count_change_while_acquiring_is_invalid_state() {
        let (c, handle) = controller(16, 16);
        assert_eq!(c.dispatch("start"), "ok");
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while handle.lock().state != RunState::Acquiring && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        let resp = c.dispatch("start 8");
        assert!(resp.starts_with("start:"));
        c.dispatch("abort");
    }
}
