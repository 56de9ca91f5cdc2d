use std::path::Path;
use std::thread;
use std::time::{Instant, SystemTime};

use anyhow::Context;
use colored::*;
use humantime::format_duration;
use log::{info, warn, Level};
use signal_hook::{consts::SIGTERM, iterator::Signals};
use tokio_util::sync::CancellationToken;

use imu_capture::config::{ConfigFile, LogConfig, Mode, CONFIG_PATH};
use imu_capture::exchange::{self, ExchangeOutcome};
use imu_capture::runner;

fn setup_logger(config: &LogConfig) -> anyhow::Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let color = match record.level() {
                Level::Error => "red",
                Level::Warn => "yellow",
                Level::Info => "green",
                Level::Debug => "blue",
                Level::Trace => "magenta",
            };

            let colored_level = format!("{}", record.level()).color(color);
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                colored_level,
                record.target(),
                message
            ))
        })
        .level(config.level_filter()?)
        .chain(std::io::stdout());

    if let Some(file) = config.log_file() {
        dispatch = dispatch.chain(fern::log_file(file).with_context(|| format!("Unable to open log file {}", file.display()))?);
    }

    dispatch.apply()?;
    Ok(())
}

fn install_shutdown_handlers(token: &CancellationToken) -> anyhow::Result<()> {
    let token_clone = token.clone();
    ctrlc::set_handler(move || {
        info!("Received SIGINT");
        token_clone.cancel();
    })
    .context("Error setting Ctrl-C handler")?;

    let token_clone = token.clone();
    let mut signals = Signals::new([SIGTERM])?;
    thread::spawn(move || {
        for _ in signals.forever() {
            info!("Received SIGTERM");
            token_clone.cancel();
        }
    });

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let app_start = Instant::now();

    let config = ConfigFile::load(Path::new(CONFIG_PATH))?;
    let missing_config = config.is_none();
    let config = config.unwrap_or_default();

    setup_logger(&config.log)?;
    if missing_config {
        warn!("No {} found, using built-in defaults", CONFIG_PATH);
    }

    match config.mode {
        Mode::Capture => {
            let capture = config.capture.resolve();
            let token = CancellationToken::new();
            install_shutdown_handlers(&token)?;

            let summary = runner::run_capture(&capture, token)?;
            info!("Capture finished: {}", summary.to_string().bold());
        }
        Mode::Exchange => {
            if exchange::request(&config.exchange)? == ExchangeOutcome::NoResponse {
                warn!("{} did not answer within {}", config.exchange.target, format_duration(config.exchange.timeout()));
            }
        }
    }

    info!("Exiting, ran for {}", format_duration(app_start.elapsed()));

    Ok(())
}
