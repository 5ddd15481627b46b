//! Process-level configuration (§8.2): the handful of knobs that belong
//! to this demo binary rather than to any concrete device driver — ring
//! capacity, default buffer count, and frame-wait timeout. Loaded with
//! the `config` crate (TOML file, `CAMERA_SERVER_`-prefixed environment
//! overrides), mirroring how this codebase's driver crates load their
//! own settings structs.

use camera_core::CameraError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub ring_capacity: usize,
    pub default_nbufs: u32,
    pub frame_timeout_s: f64,
    pub sensor_width: u32,
    pub sensor_height: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            ring_capacity: 8,
            default_nbufs: 4,
            frame_timeout_s: 0.1,
            sensor_width: 640,
            sensor_height: 480,
        }
    }
}

impl ServerSettings {
    /// Load settings, overlaying (in order) built-in defaults, an
    /// optional `camera-server.toml` in the working directory, and
    /// `CAMERA_SERVER_*` environment variables.
    pub fn load() -> Result<Self, CameraError> {
        let defaults = ServerSettings::default();
        let built = config::Config::builder()
            .set_default("ring_capacity", defaults.ring_capacity as i64)
            .map_err(|e| CameraError::Parse(e.to_string()))?
            .set_default("default_nbufs", defaults.default_nbufs as i64)
            .map_err(|e| CameraError::Parse(e.to_string()))?
            .set_default("frame_timeout_s", defaults.frame_timeout_s)
            .map_err(|e| CameraError::Parse(e.to_string()))?
            .set_default("sensor_width", defaults.sensor_width as i64)
            .map_err(|e| CameraError::Parse(e.to_string()))?
            .set_default("sensor_height", defaults.sensor_height as i64)
            .map_err(|e| CameraError::Parse(e.to_string()))?
            .add_source(config::File::with_name("camera-server").required(false))
            .add_source(config::Environment::with_prefix("CAMERA_SERVER"))
            .build()
            .map_err(|e| CameraError::Parse(e.to_string()))?;
        built
            .try_deserialize()
            .map_err(|e| CameraError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.ring_capacity, 8);
        assert_eq!(s.default_nbufs, 4);
        assert_eq!(s.frame_timeout_s, 0.1);
    }

    #[test]
    fn load_without_a_config_file_falls_back_to_defaults() {
        let s = ServerSettings::load().unwrap();
        assert_eq!(s, ServerSettings::default());
    }
}
