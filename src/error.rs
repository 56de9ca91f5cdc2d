use std::time::Duration;

/// Failures of the capture path that callers may want to tell apart.
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<CaptureError>()`
/// to inspect them.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No complete line received within {0:?}")]
    ReadTimeout(Duration),

    #[error("Unable to connect to data collection port")]
    Disconnected,

    #[error("Input channel already closed: {0}")]
    Closed(String),
}
