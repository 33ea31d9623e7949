//! Error type for the fallible setup steps of the overlay.
//!
//! None of these escape the per-frame or producer entry points: a failure
//! during lazy initialization is logged once and latches the overlay into its
//! disabled state.

use std::path::PathBuf;

/// Everything that can go wrong while bringing the overlay up.
#[derive(Debug, thiserror::Error)]
pub enum OsdError {
    /// The font resource could not be read from disk.
    #[error("failed to read font {}: {reason}", path.display())]
    FontLoad {
        /// Path handed over by the host configuration.
        path: PathBuf,
        /// The underlying I/O error message.
        reason: String,
    },
    /// The font bytes were read but could not be parsed.
    #[error("failed to parse font: {0}")]
    FontParse(String),
    /// Shader compilation or program linking failed; carries the info log.
    #[error("{0}")]
    Shader(String),
    /// A GL object (texture, buffer, vertex array) could not be created.
    #[error("GL object creation failed: {0}")]
    Gl(String),
    /// An integer anchor outside `0..=8`.
    #[error("invalid message corner {0}")]
    InvalidCorner(u32),
}
