//! End-to-end request sequences against a real `Worker` + `FrameRing` +
//! `MockDevice`, mirroring the scenarios a client transport would drive
//! through the text protocol (§6, §8 end-to-end scenarios).

use camera_controller::Controller;
use camera_core::RunState;
use camera_device::{Device, MockDevice};
use camera_ring::FrameRing;
use camera_worker::Worker;
use std::time::{Duration, Instant};

fn spawn(width: u32, height: u32) -> (Controller, Worker) {
    let mut device = MockDevice::new(width, height);
    device.open(0).unwrap();
    let config = device.get_configuration().unwrap();
    let ring = FrameRing::create(4, width, height, config);
    let worker = Worker::spawn_with(Box::new(device), ring, width, height, vec![8, 10, 12, 16], 4, 0.02);
    (Controller::new(worker.handle().clone()), worker)
}

fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !predicate() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    true
}

#[test]
fn single_capture_round_trips_through_an_attached_reader() {
    let (controller, worker) = spawn(8, 8);
    let handle = worker.handle().clone();

    assert_eq!(controller.dispatch("start 4"), "ok");
    assert!(wait_for(|| handle.lock().state == RunState::Acquiring, Duration::from_secs(2)));

    let shmid: u64 = controller.dispatch("shmid").parse().unwrap();
    let reader = FrameRing::attach(shmid).unwrap();
    assert!(wait_for(|| reader.most_recent_counter() >= 1, Duration::from_secs(2)));

    let snapshot = reader.read_latest().unwrap();
    assert_eq!(snapshot.width, 8);
    assert_eq!(snapshot.height, 8);
    assert_eq!(snapshot.counter, reader.most_recent_counter());

    assert_eq!(controller.dispatch("stop"), "ok");
    assert!(wait_for(|| handle.lock().state == RunState::Sleeping, Duration::from_secs(2)));

    assert_eq!(controller.dispatch("quit"), "ok");
    worker.join();
}

#[test]
fn configuration_mid_run_is_rejected_then_succeeds_once_quiescent() {
    let (controller, worker) = spawn(32, 32);
    let handle = worker.handle().clone();

    assert_eq!(controller.dispatch("start"), "ok");
    assert!(wait_for(|| handle.lock().state == RunState::Acquiring, Duration::from_secs(2)));
    assert_eq!(
        controller.dispatch("config exposuretime 0.01"),
        "cannot change settings during acquisition"
    );

    assert_eq!(controller.dispatch("stop"), "ok");
    assert!(wait_for(|| handle.lock().state == RunState::Sleeping, Duration::from_secs(2)));

    let resp = controller.dispatch("config xoff 4 yoff 4 width 16 height 16 exposuretime 0.002 framerate 100");
    assert_eq!(resp, "ok");
    assert_eq!(controller.dispatch("width"), "16");
    assert_eq!(controller.dispatch("xoff"), "4");

    assert_eq!(controller.dispatch("start"), "ok");
    assert!(wait_for(|| handle.lock().frames >= 1, Duration::from_secs(2)));
    let shmid: u64 = controller.dispatch("shmid").parse().unwrap();
    let reader = FrameRing::attach(shmid).unwrap();
    let snapshot = reader.read_latest().unwrap();
    assert_eq!(snapshot.width, 16);
    assert_eq!(snapshot.height, 16);

    controller.dispatch("quit");
    worker.join();
}

#[test]
fn abort_during_startup_publishes_no_frame() {
    let (controller, worker) = spawn(16, 16);
    let handle = worker.handle().clone();

    assert_eq!(controller.dispatch("start 4"), "ok");
    assert_eq!(controller.dispatch("abort"), "ok");
    assert!(wait_for(|| handle.lock().state == RunState::Sleeping, Duration::from_secs(2)));
    assert_eq!(handle.ring.most_recent_counter(), 0);

    controller.dispatch("quit");
    worker.join();
}

#[test]
fn repeated_start_stop_leaves_configuration_mirror_unchanged() {
    let (controller, worker) = spawn(8, 8);
    let handle = worker.handle().clone();
    let before = handle.lock().config.clone();

    for _ in 0..2 {
        assert_eq!(controller.dispatch("start"), "ok");
        assert!(wait_for(|| handle.lock().state == RunState::Acquiring, Duration::from_secs(2)));
        assert_eq!(controller.dispatch("stop"), "ok");
        assert!(wait_for(|| handle.lock().state == RunState::Sleeping, Duration::from_secs(2)));
    }

    assert_eq!(handle.lock().config, before);
    controller.dispatch("quit");
    worker.join();
}

#[test]
fn ping_and_state_queries_never_mutate_worker_state() {
    let (controller, worker) = spawn(8, 8);
    let handle = worker.handle().clone();

    let before = handle.lock().state;
    let _ = controller.dispatch("ping");
    let _ = controller.dispatch("state");
    let _ = controller.dispatch("roi");
    assert_eq!(handle.lock().state, before);

    controller.dispatch("quit");
    worker.join();
}
