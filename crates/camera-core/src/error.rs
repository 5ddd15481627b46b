//! Error kinds shared by every crate in the acquisition core.
//!
//! Mirrors the error taxonomy of §7 of the design: one variant per kind,
//! with enough context in the message for a client to see the offending
//! key/value without a debugger. `context` lets a caller chain a short
//! "function, kind" trail (Design Note: byte-swap style) onto an error as
//! it propagates up through Worker → Controller → client response.

use thiserror::Error;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, CameraError>;

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("device error: {0}")]
    Device(String),

    #[error("invalid state for this request")]
    InvalidState,

    #[error("bad value for '{key}': {msg}")]
    BadValue { key: String, msg: String },

    #[error("'{key}' out of range: {msg}")]
    OutOfRange { key: String, msg: String },

    #[error("bad ROI: {0}")]
    BadRoi(String),

    #[error("bad bit depth: {0}")]
    BadDepth(String),

    #[error("bad link speed: {0}")]
    BadSpeed(String),

    #[error("bad channel count: {0}")]
    BadChannels(String),

    #[error("timed out waiting for a frame")]
    Timeout,

    #[error("unsupported pixel encoding pair: {src:?} -> {dst:?}")]
    EncodingMismatch { src: String, dst: String },

    #[error("allocation failed: {0}")]
    NoMemory(String),

    #[error("could not parse request: {0}")]
    Parse(String),
}

impl CameraError {
    /// Prefix an error with the failing context, producing the single-line
    /// "context: message" form every rejected request reports to its client.
    #[must_use]
    pub fn with_context(&self, context: &str) -> String {
        format!("{context}: {self}")
    }

    /// The stable key used by `config` error responses, e.g. `"xoff"`.
    #[must_use]
    pub fn offending_key(&self) -> Option<&str> {
        match self {
            CameraError::BadValue { key, .. } | CameraError::OutOfRange { key, .. } => {
                Some(key.as_str())
            }
            _ => None,
        }
    }
}
