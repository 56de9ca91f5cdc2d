//! Line-oriented capture of serial and UDP sensor streams into text or CSV
//! files, plus a one-shot UDP request/reply exchange.

pub mod capture;
pub mod channel;
pub mod config;
pub mod error;
pub mod exchange;
pub mod runner;
pub mod writer;

pub use capture::{CaptureLoop, CaptureOptions, CaptureSummary, Record, StopReason};
pub use config::{CaptureConfig, ConfigFile};
pub use error::CaptureError;
