//! The configuration reconciler (C6): applies a requested [`Config`] to a
//! [`Device`] one field at a time, reducing before increasing, so the
//! hardware never sits in a transiently-invalid intermediate state
//! (frame rate and exposure constrain each other; ROI constrains frame
//! rate; link bitrate constrains frame rate).
//!
//! Called by the Controller only while the device is quiescent, holding
//! the Worker mutex for the whole call.

use camera_core::{Config, Result};
use camera_device::Device;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Reduce,
    Increase,
}

/// Apply `requested` to `device`, keeping `mirror` refreshed after every
/// successful field write. On success `mirror` equals the device's final,
/// authoritative configuration. On failure `mirror` reflects whatever was
/// successfully applied before the failing write — it is never left
/// stale relative to the device.
pub fn reconcile(
    device: &mut dyn Device,
    mirror: &mut Config,
    requested: &Config,
    sensor_width: u32,
    sensor_height: u32,
    supported_depths: &[u32],
) -> Result<()> {
    requested.validate(sensor_width, sensor_height, supported_depths)?;

    apply_ordered_scalars(device, mirror, requested, Direction::Reduce)?;
    apply_geometry(device, mirror, requested)?;
    apply_ordered_scalars(device, mirror, requested, Direction::Increase)?;

    Ok(())
}

fn write_and_refresh(device: &mut dyn Device, mirror: &mut Config, next: &Config) -> Result<()> {
    device.set_configuration(next)?;
    *mirror = device.get_configuration()?;
    Ok(())
}

fn apply_geometry(device: &mut dyn Device, mirror: &mut Config, requested: &Config) -> Result<()> {
    if mirror.roi == requested.roi && mirror.x_bin == requested.x_bin && mirror.y_bin == requested.y_bin {
        return Ok(());
    }
    let mut next = mirror.clone();
    next.roi = requested.roi;
    next.x_bin = requested.x_bin;
    next.y_bin = requested.y_bin;
    debug!(roi = ?next.roi, x_bin = next.x_bin, y_bin = next.y_bin, "reconcile: applying geometry change");
    write_and_refresh(device, mirror, &next)
}

fn apply_ordered_scalars(device: &mut dyn Device, mirror: &mut Config, requested: &Config, direction: Direction) -> Result<()> {
    if needs(direction, f64::from(mirror.bit_depth), f64::from(requested.bit_depth)) {
        let mut next = mirror.clone();
        next.bit_depth = requested.bit_depth;
        debug!(?direction, field = "bit_depth", value = requested.bit_depth, "reconcile: applying scalar field");
        write_and_refresh(device, mirror, &next)?;
    }

    if needs(direction, mirror.exposure_time_s, requested.exposure_time_s) {
        let mut next = mirror.clone();
        next.exposure_time_s = requested.exposure_time_s;
        debug!(?direction, field = "exposure_time_s", value = requested.exposure_time_s, "reconcile: applying scalar field");
        write_and_refresh(device, mirror, &next)?;
    }

    if needs(direction, mirror.frame_rate_hz, requested.frame_rate_hz) {
        let mut next = mirror.clone();
        next.frame_rate_hz = requested.frame_rate_hz;
        debug!(?direction, field = "frame_rate_hz", value = requested.frame_rate_hz, "reconcile: applying scalar field");
        write_and_refresh(device, mirror, &next)?;
    }

    let current_bitrate = mirror.link.map_or(0.0, |l| l.bitrate_per_channel_hz as f64);
    let requested_bitrate = requested.link.map_or(0.0, |l| l.bitrate_per_channel_hz as f64);
    if needs(direction, current_bitrate, requested_bitrate) {
        let mut next = mirror.clone();
        next.link = requested.link;
        debug!(?direction, field = "link.bitrate_per_channel_hz", value = requested_bitrate, "reconcile: applying scalar field");
        write_and_refresh(device, mirror, &next)?;
    }

    Ok(())
}

fn needs(direction: Direction, current: f64, target: f64) -> bool {
    match direction {
        Direction::Reduce => target < current,
        Direction::Increase => target > current,
    }
}
