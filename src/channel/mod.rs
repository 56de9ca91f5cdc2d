pub mod serial;
pub mod stream;
pub mod udp;

use std::time::Duration;

pub use serial::SerialSettings;
pub use stream::StreamSource;
pub use udp::{UdpSettings, UdpSource};

/// How long a channel blocks in one read before handing control back to
/// the capture loop so it can observe a shutdown request.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of one poll of an input channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, raw bytes including the terminator if there was one.
    Line(Vec<u8>),
    /// Nothing complete arrived within the poll interval.
    Idle,
    /// The channel reached end of input.
    Closed,
}

/// A line-oriented input channel owned by the capture loop.
pub trait LineSource {
    fn poll_line(&mut self) -> anyhow::Result<ReadOutcome>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self) -> anyhow::Result<()>;

    fn is_closed(&self) -> bool;

    /// Short human readable name used in log messages.
    fn describe(&self) -> String;
}

macro_rules! forward_line_source {
    ($ty:ty) => {
        impl<S: LineSource + ?Sized> LineSource for $ty {
            fn poll_line(&mut self) -> anyhow::Result<ReadOutcome> {
                (**self).poll_line()
            }

            fn close(&mut self) -> anyhow::Result<()> {
                (**self).close()
            }

            fn is_closed(&self) -> bool {
                (**self).is_closed()
            }

            fn describe(&self) -> String {
                (**self).describe()
            }
        }
    };
}

forward_line_source!(Box<S>);
forward_line_source!(&mut S);
