use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureLoop, CaptureSummary};
use crate::channel::{self, LineSource, UdpSource};
use crate::config::{CaptureConfig, InputConfig, OutputConfig, OutputFormat};
use crate::writer::{CsvWriter, TextWriter, Writer};

pub fn open_source(input: &InputConfig) -> anyhow::Result<Box<dyn LineSource>> {
    Ok(match input {
        InputConfig::Serial(settings) => Box::new(channel::serial::open(settings)?),
        InputConfig::Udp(settings) => Box::new(UdpSource::bind(settings)?),
    })
}

pub fn open_writer(output: &OutputConfig) -> anyhow::Result<Box<dyn Writer>> {
    let path = output.resolve_path(Utc::now());
    log::info!("Logging data to {}...", path.display());

    Ok(match output.format {
        OutputFormat::Csv => Box::new(CsvWriter::create(&path, output.header.columns())?),
        OutputFormat::Text => Box::new(TextWriter::create(&path)?),
    })
}

/// Open the configured channel and output file, then capture until the
/// token is cancelled or the input ends.
pub fn run_capture(config: &CaptureConfig, token: CancellationToken) -> anyhow::Result<CaptureSummary> {
    let source = open_source(&config.input)?;
    let writer = open_writer(&config.output)?;

    CaptureLoop::new(source, writer, config.options.clone(), token).run()
}
