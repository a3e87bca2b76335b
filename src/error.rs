//! # Error Types
//!
//! All fallible operations in the crate return [`FourbarError`].
//!
//! ## Error Types
//! - `NotFound` - A source file or directory does not exist
//! - `InvalidFormat` - A `\transpose` or `\relative` directive does not match its pattern
//! - `UnknownPitch` - A pitch name outside the fixed lookup table
//! - `Config` - Invalid YAML configuration
//! - `Io` - Any other I/O failure
//!
//! Beat arithmetic never fails: a bar that cannot be fixed is reported as
//! invalid data, not as an error.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FourbarError {
    /// Source file or directory is missing.
    ///
    /// # Example
    /// ```
    /// # use fourbar::FourbarError;
    /// let err = FourbarError::NotFound { path: "tunes/blues.ly".into() };
    /// assert_eq!(err.to_string(), "File not found: tunes/blues.ly");
    /// ```
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A directive did not match its expected pattern.
    ///
    /// # Example
    /// ```
    /// # use fourbar::FourbarError;
    /// let err = FourbarError::InvalidFormat {
    ///     directive: "transpose",
    ///     text: "\\transpose x".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invalid transpose directive: \\transpose x");
    /// ```
    #[error("Invalid {directive} directive: {text}")]
    InvalidFormat {
        directive: &'static str,
        text: String,
    },

    /// Pitch name not present in the transposition table.
    #[error("Unknown pitch: {0}")]
    UnknownPitch(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
