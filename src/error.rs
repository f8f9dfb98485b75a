//! Error types shared by the detection pipeline and its sample sources.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A non-finite sample reached the detector boundary.
    #[error("invalid sample: {value} is not finite")]
    InvalidSample { value: f64 },

    /// Parameters rejected at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A text sample stream could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An audio container could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
