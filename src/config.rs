use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_derive::Deserialize;

use crate::capture::{CaptureOptions, Validation};
use crate::channel::{SerialSettings, UdpSettings};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> anyhow::Result<ConfigFile> {
        toml::from_str(contents).context("Unable to parse the config file")
    }

    /// Read the config file at `path`. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> anyhow::Result<Option<ConfigFile>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e).context(format!("Unable to open the config file {}", path.display()))),
        };

        Ok(Some(ConfigFile::parse(&contents)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Capture,
    Exchange,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> LogConfig {
        LogConfig { level: "info".to_string(), file: Some(PathBuf::from("output.log")) }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> anyhow::Result<log::LevelFilter> {
        self.level.parse().map_err(|_| anyhow::anyhow!("Unknown log level: {}", self.level))
    }

    /// Log file, if any. An empty `file` turns file logging off.
    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_deref().filter(|path| !path.as_os_str().is_empty())
    }
}

/// Named capture configurations, one per acquisition script in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// MPU6050 board at 115200 baud, accelerometer and gyro each with a timestamp.
    Mpu6050,
    /// Generic IMU logger at 9600 baud with a trailing temperature column.
    #[default]
    SerialLogger,
    /// Raw text capture, echoing every line.
    SensorText,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InputConfig {
    Serial(SerialSettings),
    Udp(UdpSettings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Text,
}

/// The two header layouts found on the capture boards. They disagree on
/// column count and order, so neither is the default for every preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderPreset {
    /// `time,ax,ay,az,time,gx,gy,gz`
    AccelTimeGyro,
    /// `time,ax,ay,az,gx,gy,gz,t`
    AccelGyroTemp,
}

impl HeaderPreset {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            HeaderPreset::AccelTimeGyro => &["time", "ax", "ay", "az", "time", "gx", "gy", "gz"],
            HeaderPreset::AccelGyroTemp => &["time", "ax", "ay", "az", "gx", "gy", "gz", "t"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HeaderSpec {
    Preset(HeaderPreset),
    Columns(Vec<String>),
}

impl Default for HeaderSpec {
    fn default() -> HeaderSpec {
        HeaderSpec::Preset(HeaderPreset::AccelGyroTemp)
    }
}

impl HeaderSpec {
    pub fn columns(&self) -> Vec<String> {
        match self {
            HeaderSpec::Preset(preset) => preset.columns().iter().map(|c| c.to_string()).collect(),
            HeaderSpec::Columns(columns) => columns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub header: HeaderSpec,
    /// Insert the capture start time before the extension.
    #[serde(default)]
    pub timestamped: bool,
}

impl OutputConfig {
    pub fn resolve_path(&self, started: DateTime<Utc>) -> PathBuf {
        if !self.timestamped {
            return self.path.clone();
        }

        let stem = self.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let mut filename = format!("{}_{}", stem, started.format("%Y%m%d_%H%M%S"));
        if let Some(ext) = self.path.extension() {
            filename.push('.');
            filename.push_str(&ext.to_string_lossy());
        }
        self.path.with_file_name(filename)
    }
}

/// `[capture]` as written in the file: a preset plus optional overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureSection {
    pub preset: Option<Preset>,
    pub input: Option<InputConfig>,
    pub output: Option<OutputConfig>,
    pub read_timeout_ms: Option<u64>,
    pub lossy_utf8: Option<bool>,
    pub echo: Option<bool>,
    pub validation: Option<Validation>,
    pub expected_fields: Option<usize>,
}

impl CaptureSection {
    pub fn resolve(&self) -> CaptureConfig {
        let mut config = CaptureConfig::preset(self.preset.unwrap_or_default());

        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(ms) = self.read_timeout_ms {
            config.options.read_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(lossy) = self.lossy_utf8 {
            config.options.lossy_utf8 = lossy;
        }
        if let Some(echo) = self.echo {
            config.options.echo = echo;
        }
        if let Some(validation) = self.validation {
            config.options.check.validation = validation;
        }
        if self.expected_fields.is_some() {
            config.options.check.expected_fields = self.expected_fields;
        }

        config
    }
}

/// Everything a capture run needs.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub options: CaptureOptions,
}

impl CaptureConfig {
    pub fn preset(preset: Preset) -> CaptureConfig {
        match preset {
            Preset::Mpu6050 => CaptureConfig {
                input: InputConfig::Serial(SerialSettings::new("/dev/cu.usbmodem11201", 115200)),
                output: OutputConfig {
                    path: PathBuf::from("Test_7.csv"),
                    format: OutputFormat::Csv,
                    header: HeaderSpec::Preset(HeaderPreset::AccelTimeGyro),
                    timestamped: false,
                },
                options: CaptureOptions::default(),
            },
            Preset::SerialLogger => CaptureConfig {
                input: InputConfig::Serial(SerialSettings::new("/dev/cu.usbmodem1301", 9600)),
                output: OutputConfig {
                    path: PathBuf::from("IMU_Data_1.csv"),
                    format: OutputFormat::Csv,
                    header: HeaderSpec::Preset(HeaderPreset::AccelGyroTemp),
                    timestamped: false,
                },
                options: CaptureOptions::default(),
            },
            Preset::SensorText => CaptureConfig {
                input: InputConfig::Serial(SerialSettings {
                    settle_delay_ms: 2000,
                    ..SerialSettings::new("/dev/cu.usbmodem1401", 115200)
                }),
                output: OutputConfig {
                    path: PathBuf::from("sensor_data.txt"),
                    format: OutputFormat::Text,
                    header: HeaderSpec::default(),
                    timestamped: false,
                },
                options: CaptureOptions { echo: true, ..CaptureOptions::default() },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub target: String,
    pub payload: String,
    pub timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> ExchangeConfig {
        ExchangeConfig {
            target: "192.168.1.165:2390".to_string(),
            payload: "Hello from Mac!".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
