//! End-to-end exercises of the Worker state machine against `MockDevice`
//! and a real `FrameRing`, mirroring the scenarios in the core's testable
//! properties: single capture, repeated start/stop, abort discarding the
//! in-flight frame, and full EXIT drain.

use camera_core::{Command, PixelEncoding, RunState, Roi};
use camera_device::{Device, MockDevice};
use camera_ring::FrameRing;
use camera_worker::Worker;
use std::time::{Duration, Instant};

fn wait_until(handle: &camera_worker::WorkerHandle, predicate: impl Fn(RunState) -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let state = handle.lock().state;
        if predicate(state) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn spawn_worker(width: u32, height: u32) -> Worker {
    let mut device = MockDevice::new(width, height);
    device.open(0).unwrap();
    let config = device.get_configuration().unwrap();
    let ring = FrameRing::create(4, width, height, config);
    Worker::spawn_with(
        Box::new(device),
        ring,
        width,
        height,
        vec![8, 10, 12, 16],
        4,
        0.02,
    )
}

#[test]
fn single_capture_publishes_at_least_one_frame() {
    let worker = spawn_worker(8, 8);
    let handle = worker.handle().clone();

    {
        let mut guard = handle.lock();
        guard.command = Command::Start;
    }
    handle.notify();

    assert!(wait_until(&handle, |s| s == RunState::Acquiring, Duration::from_secs(2)));
    assert!(wait_until(&handle, |_| handle.lock().frames >= 1, Duration::from_secs(2)));

    let counter = handle.ring.most_recent_counter();
    assert!(counter >= 1);
    let snapshot = handle.ring.read_latest().unwrap();
    assert_eq!(snapshot.width, 8);
    assert_eq!(snapshot.height, 8);

    {
        let mut guard = handle.lock();
        guard.command = Command::Stop;
    }
    handle.notify();
    assert!(wait_until(&handle, |s| s == RunState::Sleeping, Duration::from_secs(2)));

    {
        let mut guard = handle.lock();
        guard.command = Command::Exit;
    }
    handle.notify();
    worker.join();
}

#[test]
fn repeated_start_stop_cycles_return_to_sleeping_each_time() {
    let worker = spawn_worker(4, 4);
    let handle = worker.handle().clone();

    for _ in 0..3 {
        handle.lock().command = Command::Start;
        handle.notify();
        assert!(wait_until(&handle, |s| s == RunState::Acquiring, Duration::from_secs(2)));

        handle.lock().command = Command::Stop;
        handle.notify();
        assert!(wait_until(&handle, |s| s == RunState::Sleeping, Duration::from_secs(2)));
    }

    handle.lock().command = Command::Exit;
    handle.notify();
    worker.join();
}

#[test]
fn exit_drains_to_done_and_thread_joins() {
    let worker = spawn_worker(4, 4);
    let handle = worker.handle().clone();

    handle.lock().command = Command::Start;
    handle.notify();
    assert!(wait_until(&handle, |s| s == RunState::Acquiring, Duration::from_secs(2)));

    handle.lock().command = Command::Exit;
    handle.notify();

    assert!(wait_until(&handle, |s| s == RunState::Done, Duration::from_secs(2)));
    worker.join();
}

#[test]
fn abort_returns_to_sleeping_without_hanging() {
    let worker = spawn_worker(4, 4);
    let handle = worker.handle().clone();

    handle.lock().command = Command::Start;
    handle.notify();
    assert!(wait_until(&handle, |s| s == RunState::Acquiring, Duration::from_secs(2)));

    handle.lock().command = Command::Abort;
    handle.notify();
    assert!(wait_until(&handle, |s| s == RunState::Sleeping, Duration::from_secs(2)));

    handle.lock().command = Command::Exit;
    handle.notify();
    worker.join();
}

#[test]
fn config_mirror_geometry_flows_into_published_frame_shape() {
    let mut device = MockDevice::new(16, 16);
    device.open(0).unwrap();
    let mut config = device.get_configuration().unwrap();
    config.roi = Roi {
        x_offset: 0,
        y_offset: 0,
        width: 8,
        height: 8,
    };
    config.encoding = PixelEncoding::Mono8;
    device.set_configuration(&config).unwrap();
    let config = device.get_configuration().unwrap();

    let ring = FrameRing::create(2, 16, 16, config);
    let worker = Worker::spawn_with(Box::new(device), ring, 16, 16, vec![8, 10, 12, 16], 2, 0.02);
    let handle = worker.handle().clone();

    handle.lock().command = Command::Start;
    handle.notify();
    assert!(wait_until(&handle, |_| handle.lock().frames >= 1, Duration::from_secs(2)));

    let snapshot = handle.ring.read_latest().unwrap();
    assert_eq!(snapshot.width, 8);
    assert_eq!(snapshot.height, 8);

    handle.lock().command = Command::Exit;
    handle.notify();
    worker.join();
}
