//! The device configuration record (§3) and its field-level validators.
//!
//! Validation here only checks that a single field is individually sane
//! (the kind of check that never needs the device). Whether the *joint*
//! record is acceptable to the hardware is something only the device can
//! answer — see `camera-reconcile` for the ordered apply algorithm that
//! asks it field by field.

use crate::error::CameraError;
use serde::{Deserialize, Serialize};

/// Region of interest, in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    #[must_use]
    pub fn full_sensor(sensor_width: u32, sensor_height: u32) -> Self {
        Self {
            x_offset: 0,
            y_offset: 0,
            width: sensor_width,
            height: sensor_height,
        }
    }

    /// Validate this ROI against sensor geometry. `offset + extent == sensor
    /// extent` is accepted; `offset + extent > sensor extent` is `BadRoi`.
    pub fn validate(&self, sensor_width: u32, sensor_height: u32) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::BadRoi("width and height must be >= 1".into()));
        }
        let x_end = self
            .x_offset
            .checked_add(self.width)
            .ok_or_else(|| CameraError::BadRoi("x_offset + width overflows".into()))?;
        let y_end = self
            .y_offset
            .checked_add(self.height)
            .ok_or_else(|| CameraError::BadRoi("y_offset + height overflows".into()))?;
        if x_end > sensor_width {
            return Err(CameraError::BadRoi(format!(
                "x_offset + width ({x_end}) exceeds sensor width ({sensor_width})"
            )));
        }
        if y_end > sensor_height {
            return Err(CameraError::BadRoi(format!(
                "y_offset + height ({y_end}) exceeds sensor height ({sensor_height})"
            )));
        }
        Ok(())
    }
}

/// Optional link (bus/interface) parameters. `bitrate_per_channel_hz == 0`
/// means "auto", per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinkParams {
    pub channels: u32,
    pub bitrate_per_channel_hz: u64,
}

impl LinkParams {
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.channels == 0 {
            return Err(CameraError::BadChannels(
                "channel count must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Pixel encoding of a frame or device-native buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelEncoding {
    Mono8,
    Mono16,
    Mono32,
    Float32,
    Float64,
    RawBayerRggb8,
    RawBayerGrbg8,
    RawBayerGbrg8,
    RawBayerBggr8,
    RawBayerRggb16,
    RawBayerGrbg16,
    RawBayerGbrg16,
    RawBayerBggr16,
    Unknown,
}

impl PixelEncoding {
    /// Bytes occupied by one pixel in this encoding, or `None` for
    /// `Unknown` (which carries no element-size contract).
    #[must_use]
    pub fn bytes_per_pixel(self) -> Option<usize> {
        use PixelEncoding::*;
        match self {
            Mono8 | RawBayerRggb8 | RawBayerGrbg8 | RawBayerGbrg8 | RawBayerBggr8 => Some(1),
            Mono16 | RawBayerRggb16 | RawBayerGrbg16 | RawBayerGbrg16 | RawBayerBggr16 => Some(2),
            Mono32 | Float32 => Some(4),
            Float64 => Some(8),
            Unknown => None,
        }
    }
}

/// The device configuration record (§3): ROI, binning, exposure, frame
/// rate, bit depth, pixel encoding, optional link parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub roi: Roi,
    pub x_bin: u32,
    pub y_bin: u32,
    pub exposure_time_s: f64,
    pub frame_rate_hz: f64,
    pub bit_depth: u32,
    pub encoding: PixelEncoding,
    pub link: Option<LinkParams>,
}

impl Config {
    /// Validate every field individually. Does not check hardware
    /// co-dependencies (frame rate vs. exposure, ROI vs. frame rate, etc.) —
    /// those can only be verified by applying the change to the device, per
    /// `camera-reconcile`.
    pub fn validate(&self, sensor_width: u32, sensor_height: u32, supported_depths: &[u32]) -> Result<(), CameraError> {
        self.roi.validate(sensor_width, sensor_height)?;

        if self.x_bin == 0 || self.y_bin == 0 {
            return Err(CameraError::OutOfRange {
                key: "binning".into(),
                msg: "binning factors must be >= 1".into(),
            });
        }
        if self.exposure_time_s < 0.0 {
            return Err(CameraError::OutOfRange {
                key: "exposuretime".into(),
                msg: "exposure time must be >= 0".into(),
            });
        }
        if self.frame_rate_hz <= 0.0 {
            return Err(CameraError::OutOfRange {
                key: "framerate".into(),
                msg: "frame rate must be > 0".into(),
            });
        }
        if !supported_depths.contains(&self.bit_depth) {
            return Err(CameraError::BadDepth(format!(
                "{} not in supported set {:?}",
                self.bit_depth, supported_depths
            )));
        }
        if let Some(link) = self.link {
            link.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            roi: Roi::full_sensor(2048, 2048),
            x_bin: 1,
            y_bin: 1,
            exposure_time_s: 0.01,
            frame_rate_hz: 30.0,
            bit_depth: 16,
            encoding: PixelEncoding::Mono16,
            link: None,
        }
    }

    #[test]
    fn roi_boundary_at_sensor_edge_is_accepted() {
        let roi = Roi {
            x_offset: 2048 - 640,
            y_offset: 2048 - 480,
            width: 640,
            height: 480,
        };
        assert!(roi.validate(2048, 2048).is_ok());
    }

    #[test]
    fn roi_one_past_sensor_edge_is_bad_roi() {
        let roi = Roi {
            x_offset: 2048 - 640 + 1,
            y_offset: 0,
            width: 640,
            height: 480,
        };
        assert!(matches!(roi.validate(2048, 2048), Err(CameraError::BadRoi(_))));
    }

    #[test]
    fn zero_binning_is_rejected() {
        let mut cfg = base_config();
        cfg.x_bin = 0;
        assert!(cfg.validate(2048, 2048, &[8, 12, 16]).is_err());
    }

    #[test]
    fn negative_exposure_is_rejected() {
        let mut cfg = base_config();
        cfg.exposure_time_s = -1.0;
        assert!(cfg.validate(2048, 2048, &[8, 12, 16]).is_err());
    }

    #[test]
    fn unsupported_bit_depth_is_bad_depth() {
        let mut cfg = base_config();
        cfg.bit_depth = 24;
        assert!(matches!(
            cfg.validate(2048, 2048, &[8, 12, 16]),
            Err(CameraError::BadDepth(_))
        ));
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate(2048, 2048, &[8, 12, 16]).is_ok());
    }
}
