//! # Configuration Management
//!
//! This module handles loading and validating configuration from the
//! departure-config.toml file: display timing, the fallback station name,
//! TfL credentials and the list of stops to monitor.
//!
//! A missing file is not an error; the board starts with the built-in defaults.
//! A file that exists but fails to parse or validate stops the program, since
//! a half-understood configuration would produce a misleading board.

use crate::departures::NegativeArrivals;
use crate::display::Rotation;
use chrono::NaiveTime;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "departure-config.toml";

/// Highest frame rate accepted; beyond this the tick interval rounds to nothing.
const MAX_TARGET_FPS: f32 = 1000.0;
/// Longest redraw interval accepted for the slow rows (one day).
const MAX_REFRESH_TIME: f32 = 86_400.0;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config file format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Application configuration loaded from departure-config.toml
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Display timing and hardware
    pub display: DisplayConfig,
    /// What to show and when
    pub journey: JourneyConfig,
    /// TfL API access and monitored stops
    pub api: ApiConfig,
}

/// Display timing and panel configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render loop rate in frames per second
    pub target_fps: f32,
    /// Seconds between redraws of the slow rows (station names, routes, minutes)
    pub refresh_time: f32,
    /// Panel rotation in quarter turns; only 0 and 2 suit the landscape layout
    pub screen_rotation: u8,
    /// Discard frames instead of driving the panel
    pub headless: bool,
    /// SPI and GPIO wiring for the SSD1322
    pub hardware: HardwareConfig,
}

/// SSD1322 wiring on the Raspberry Pi header
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub spi_device: String,
    pub spi_speed_hz: u32,
    pub gpio_chip: String,
    /// Data/command select (BCM numbering)
    pub dc_pin: u32,
    /// Panel reset (BCM numbering)
    pub rst_pin: u32,
}

/// Journey and board content configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct JourneyConfig {
    /// Name shown on the welcome screen when there is nothing to display
    pub out_of_hours_name: String,
    /// Departures kept per station
    pub max_departures: usize,
    /// Treatment of predictions for services that have already left
    pub negative_arrivals: NegativeArrivals,
    /// When set, the board only fetches data inside this window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<OperatingHours>,
}

/// Daily window during which departures are fetched.
///
/// A window whose end is before its start wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperatingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl OperatingHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// TfL Unified API configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Application key sent as the `app_key` header
    pub app_key: String,
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Stops to query, in display order
    pub stops: Vec<StopConfig>,
}

/// One stop to query.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StopConfig {
    /// Station name shown on the board; stops sharing a name are merged
    pub station: String,
    /// TfL line id (e.g. "northern", "37")
    pub line: String,
    /// NaPTAN id. Without one, the whole line is fetched and filtered by station name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<String>,
    /// "inbound" or "outbound"
    pub direction: String,
    /// Fixed route text; defaults to each prediction's destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            target_fps: 10.0,
            refresh_time: 1.0,
            screen_rotation: 0,
            headless: false,
            hardware: HardwareConfig::default(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            spi_device: "/dev/spidev0.0".to_string(),
            spi_speed_hz: 8_000_000,
            gpio_chip: "/dev/gpiochip0".to_string(),
            dc_pin: 24,
            rst_pin: 25,
        }
    }
}

impl Default for JourneyConfig {
    fn default() -> Self {
        JourneyConfig {
            out_of_hours_name: "Clapham North".to_string(),
            max_departures: 3,
            negative_arrivals: NegativeArrivals::Unavailable,
            operating_hours: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            app_key: String::new(),
            base_url: "https://api.tfl.gov.uk".to_string(),
            timeout_secs: 10,
            stops: vec![
                StopConfig {
                    station: "Clapham North".to_string(),
                    line: "northern".to_string(),
                    stop_id: Some("940GZZLUCPN".to_string()),
                    direction: "outbound".to_string(),
                    label: None,
                },
                StopConfig {
                    station: "Bedford Road".to_string(),
                    line: "37".to_string(),
                    stop_id: None,
                    direction: "inbound".to_string(),
                    label: Some("37  Clapham Junction".to_string()),
                },
                StopConfig {
                    station: "Bedford Road".to_string(),
                    line: "35".to_string(),
                    stop_id: None,
                    direction: "inbound".to_string(),
                    label: Some("35  Clapham Junction".to_string()),
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from departure-config.toml
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified path.
    /// Falls back to the default configuration if the file doesn't exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::from_toml_str(&contents)?;
                info!(
                    "Loaded configuration from {} ({} stops)",
                    path.display(),
                    config.api.stops.len()
                );
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No config file at {}, using default configuration",
                    path.display()
                );
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the render loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fps = self.display.target_fps;
        if !fps.is_finite() || fps <= 0.0 || fps > MAX_TARGET_FPS {
            return Err(invalid(
                "display.target_fps",
                format!("{fps} is not in (0, {MAX_TARGET_FPS}]"),
            ));
        }

        self.frame_interval()?;

        let refresh = self.display.refresh_time;
        if !(0.0..=MAX_REFRESH_TIME).contains(&refresh) {
            return Err(invalid(
                "display.refresh_time",
                format!("{refresh} is not in [0, {MAX_REFRESH_TIME}] seconds"),
            ));
        }
        self.refresh_interval()?;

        if Rotation::from_quarter_turns(self.display.screen_rotation).is_none() {
            return Err(invalid(
                "display.screen_rotation",
                format!(
                    "{} quarter turns would make the panel portrait; use 0 or 2",
                    self.display.screen_rotation
                ),
            ));
        }

        if self.journey.out_of_hours_name.trim().is_empty() {
            return Err(invalid("journey.out_of_hours_name", "must not be empty".into()));
        }

        if self.journey.max_departures == 0 {
            return Err(invalid("journey.max_departures", "must be at least 1".into()));
        }

        if self.api.timeout_secs == 0 {
            return Err(invalid("api.timeout_secs", "must be at least 1".into()));
        }

        if self.api.stops.is_empty() {
            return Err(invalid("api.stops", "at least one stop is required".into()));
        }

        for stop in &self.api.stops {
            if stop.station.trim().is_empty() || stop.line.trim().is_empty() {
                return Err(invalid(
                    "api.stops",
                    format!("stop {:?} needs both a station and a line", stop),
                ));
            }
        }

        Ok(())
    }

    /// Station rotation order: configured station names, first occurrence wins.
    pub fn stations(&self) -> Vec<String> {
        let mut stations: Vec<String> = Vec::new();
        for stop in &self.api.stops {
            if !stations.contains(&stop.station) {
                stations.push(stop.station.clone());
            }
        }
        stations
    }

    /// Interval between render ticks.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        let fps = self.display.target_fps;
        Duration::try_from_secs_f32(1.0 / fps)
            .map_err(|e| invalid("display.target_fps", format!("{fps} frames per second: {e}")))
    }

    /// Redraw interval of the slow rows.
    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        let refresh = self.display.refresh_time;
        Duration::try_from_secs_f32(refresh)
            .map_err(|e| invalid("display.refresh_time", format!("{refresh} seconds: {e}")))
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
