use std::time::Duration;

use anyhow::Context;
use serde_derive::Deserialize;
use serialport::SerialPort;

use super::{StreamSource, POLL_INTERVAL};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Wait after opening, before the first read. Boards that reset when the
    /// port opens need a moment before they start talking.
    #[serde(default)]
    pub settle_delay_ms: u64,
}

impl SerialSettings {
    pub fn new(port: &str, baud_rate: u32) -> SerialSettings {
        SerialSettings { port: port.to_string(), baud_rate, settle_delay_ms: 0 }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

pub type SerialSource = StreamSource<Box<dyn SerialPort>>;

/// Open the serial port described by `settings` as a line source.
pub fn open(settings: &SerialSettings) -> anyhow::Result<SerialSource> {
    log::info!("Opening serial port: {} at baud rate: {}", settings.port, settings.baud_rate);

    let port = serialport::new(settings.port.clone(), settings.baud_rate)
        .timeout(POLL_INTERVAL)
        .open()
        .with_context(|| format!("Unable to open serial port {}", settings.port))?;

    if settings.settle_delay_ms > 0 {
        log::debug!("Waiting {} for the connection to establish", humantime::format_duration(settings.settle_delay()));
        std::thread::sleep(settings.settle_delay());
    }

    Ok(StreamSource::new("Serial port", port))
}
