//! Core error kinds shared by the extractor, index store, and matcher.
//!
//! The CLI binary wraps these in `anyhow` at its own boundary; inside the
//! library every fallible operation returns `Result<_, Error>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input signal is too short to produce even one STFT frame.
    #[error("signal too short: {samples} samples, need at least {required}")]
    ShortSignal { samples: usize, required: usize },

    /// The index file's embedded parameter digest does not match the
    /// runtime `Config`.
    #[error("index was built with a different fingerprinting configuration")]
    ParamDigestMismatch,

    /// The index file failed a structural check (magic, CRC, truncation).
    #[error("index file is corrupt: {0}")]
    CorruptIndex(String),

    /// Underlying storage I/O failure.
    #[error("index I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,

    /// A hard deadline elapsed with no partial-result fallback requested.
    /// `orchestrator::identify` degrades to `partial = true` instead of
    /// returning this.
    #[error("operation timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;
