//! Minimal runnable wiring for the acquisition core: a `MockDevice`, a
//! `FrameRing`, a `Worker` thread, and a `Controller` driven by a
//! stdin/stdout line loop. This is a demonstration of how the pieces fit
//! together, not "the" transport — an embedder is free to drive the same
//! `Controller::dispatch` from a socket, a message queue, anything that
//! produces request lines (§6).

mod settings;

use anyhow::{Context, Result};
use camera_controller::Controller;
use camera_core::Command;
use camera_device::{Device, MockDevice};
use camera_ring::FrameRing;
use camera_worker::Worker;
use settings::ServerSettings;
use std::io::{self, BufRead, Write};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter};

fn main() {
    let base_filter = EnvFilter::from_default_env();
    let (filter, reload_handle) = reload::Layer::new(base_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(reload_handle) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = ?e, "camera-server: initialization failed");
            std::process::exit(1);
        }
    }
}

/// Process-level glue: settings load, device open, stdin loop. Uses
/// `anyhow::Context` to annotate failures with what this binary was
/// doing at the time, the way this codebase's other bins wrap their own
/// top-level I/O — the core crates stay `CameraError`-typed underneath
/// since their callers need to match on error kind.
fn run(reload_handle: reload::Handle<EnvFilter, tracing_subscriber::Registry>) -> Result<()> {
    let settings = ServerSettings::load().context("loading camera-server settings")?;
    tracing::info!(?settings, "camera-server: settings loaded");

    let mut device = MockDevice::new(settings.sensor_width, settings.sensor_height);
    device.open(0).context("opening the mock device")?;
    let config = device.get_configuration().context("reading initial device configuration")?;
    let ring = FrameRing::create(
        settings.ring_capacity,
        settings.sensor_width,
        settings.sensor_height,
        config,
    );

    let worker = Worker::spawn_with(
        Box::new(device),
        ring,
        settings.sensor_width,
        settings.sensor_height,
        vec![8, 10, 12, 16],
        settings.default_nbufs,
        settings.frame_timeout_s,
    );
    let controller = Controller::new(worker.handle().clone());

    tracing::info!(
        shmid = worker.handle().ring.identifier(),
        "camera-server: ready, reading requests from stdin"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut debug_on = worker.handle().debug();
    for line in stdin.lock().lines() {
        let line = line.context("reading a request line from stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response = controller.dispatch(trimmed);
        let _ = writeln!(stdout, "{response}");
        let _ = stdout.flush();

        let now_debug = worker.handle().debug();
        if now_debug != debug_on {
            let new_filter = if now_debug {
                EnvFilter::new("debug")
            } else {
                EnvFilter::from_default_env()
            };
            if let Err(e) = reload_handle.reload(new_filter) {
                tracing::warn!(error = %e, "camera-server: failed to reload log filter");
            }
            debug_on = now_debug;
        }

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
    }

    // Whether the loop ended on an explicit quit or on stdin closing, make
    // sure the Worker is told to drain and shut down.
    worker.handle().lock().command = Command::Exit;
    worker.handle().notify();
    worker.join();
    tracing::info!("camera-server: shut down cleanly");
    Ok(())
}
