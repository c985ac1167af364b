use std::io;

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("length mismatch: {what} has {got} samples, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("timestamps must be non-decreasing (index {index})")]
    Unsorted { index: usize },

    #[error("invalid sample at index {index}: clean() before building an evaluator")]
    InvalidSample { index: usize },

    #[error("invalid resolution: {0}")]
    InvalidResolution(f64),

    #[error("time {t} is outside the chunk grid for step {step}")]
    TimeOutOfRange { t: f64, step: f64 },

    #[error("wrong field count: expected {expected}, got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("field '{0}' is not co-sampled with the first field")]
    NotCosampled(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("archive has no resolutions")]
    NoResolutions,

    #[error("resolution {0} already registered")]
    DuplicateResolution(f64),

    #[error("no storage backend given and archive has no default")]
    NoBackend,

    #[error("locator '{locator}' does not start with '{prefix}'")]
    LocatorMismatch { locator: String, prefix: String },

    #[error("locator not found: {0}")]
    LocatorNotFound(String),

    #[error("parse error in {locator} line {line}: {msg}")]
    Parse {
        locator: String,
        line: usize,
        msg: String,
    },

    #[error("corrupt catalog: {0}")]
    Corrupt(&'static str),

    #[error("unsupported catalog version: {0}")]
    UnsupportedVersion(u32),

    #[error("catalog checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;
