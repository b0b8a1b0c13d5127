//! Error types for the simpack command-line tool.
//!
//! Library errors surface as [`simpack_formats::FormatError`]; the commands
//! wrap them with `anyhow` context. Only configuration problems get their own
//! type here.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Bone limit outside what the mesh format can address
    #[error("max bones must be between 1 and {max}, got {value}")]
    MaxBonesOutOfRange {
        /// Requested limit
        value: usize,
        /// Largest accepted limit
        max: usize,
    },

    /// A hexadecimal argument did not parse
    #[error("invalid hex value '{value}': {reason}")]
    InvalidHex {
        /// The rejected argument
        value: String,
        /// Reason for rejection
        reason: String,
    },

    /// Missing required configuration value
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
