pub mod args;
pub mod bpm;
pub mod config;
pub mod detector;
pub mod energy;
pub mod error;
pub mod highpass;
pub mod source;
pub mod stream;
pub mod threshold;
pub mod window;

pub use detector::QrsDetector;
pub use error::{Error, Result};
