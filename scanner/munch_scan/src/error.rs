//! Engine-level failures.
//!
//! Unrecognized input is *not* an error — the engine skips one symbol and
//! keeps going. Errors here are terminal: a scan is a single pass over an
//! immutable source, so nothing is retried.

use thiserror::Error;

/// Terminal failure of a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Reading from the source failed. Fatal; the scan is aborted.
    #[error("source read failed: {0}")]
    Read(#[from] std::io::Error),

    /// The source byte stream is not valid UTF-8. The engine consumes
    /// characters, so a malformed or truncated sequence aborts the scan.
    #[error("source is not valid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the first byte of the offending sequence.
        offset: u64,
    },

    /// The engine task went away without delivering a terminal event.
    /// Indicates a panic on the engine thread.
    #[error("scan engine disconnected before end of input")]
    Disconnected,
}
