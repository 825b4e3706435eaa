use crate::direction::{Direction, DirectionMap};
use crate::emergency::DEFAULT_ALERT_DURATION_MS;
use crate::peripheral::gpio_lights::HeadPins;
use crate::phase::{DEFAULT_ALL_RED_MS, DEFAULT_YELLOW_MS, PhaseSettings};
use crate::presence::DEFAULT_DETECTION_THRESHOLD_MM;
use crate::siren::SirenSettings;
use crate::timing::{DEFAULT_MAX_GREEN_MS, DEFAULT_MIN_GREEN_MS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
pub const DEFAULT_SENSING_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DIAGNOSTICS_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_SAMPLE_SPACING_US: u64 = 125;
pub const DEFAULT_SIREN_DIRECTION: Direction = Direction::East;
/// Upper bound on the all-red hold; the loop does nothing else meanwhile.
pub const MAX_ALL_RED_MS: u64 = 5_000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub timing: Option<TimingSection>,
    #[serde(default)]
    pub presence: Option<PresenceSection>,
    #[serde(default)]
    pub siren: Option<SirenSection>,
    #[serde(default)]
    pub emergency: Option<EmergencySection>,
    #[serde(default)]
    pub hardware: Option<HardwareSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TimingSection {
    /// Control loop period (default: 10)
    pub tick_interval_ms: Option<u64>,
    pub min_green_ms: Option<u64>,
    pub max_green_ms: Option<u64>,
    pub yellow_ms: Option<u64>,
    /// All-red clearance between a yellow and the next green (default: 1000)
    pub all_red_ms: Option<u64>,
    /// How often the range sensors are read (default: 100)
    pub sensing_interval_ms: Option<u64>,
    pub diagnostics_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PresenceSection {
    pub detection_threshold_mm: Option<u16>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SirenSection {
    pub sample_count: Option<usize>,
    pub sample_spacing_us: Option<u64>,
    pub band_low_hz: Option<f32>,
    pub band_high_hz: Option<f32>,
    pub min_strength: Option<f32>,
    pub calibration_scans: Option<usize>,
    /// Approach favored on a siren emergency (default: east)
    pub direction: Option<Direction>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmergencySection {
    pub alert_duration_ms: Option<u64>,
}

/// One value per approach; every direction must be present in the file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PerDirection<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

impl<T: Copy> PerDirection<T> {
    pub fn to_map(&self) -> DirectionMap<T> {
        DirectionMap::from_fn(|direction| match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HardwareSection {
    /// Signal head GPIO pins per approach
    pub lights: PerDirection<HeadPins>,
    /// XSHUT GPIO pins of the range sensors per approach
    #[serde(default)]
    pub xshut_pins: Option<PerDirection<u8>>,
    /// Serial device of the RFID reader
    #[serde(default)]
    pub rfid_uart: Option<PathBuf>,
    /// MCP3008 channel of the microphone
    #[serde(default)]
    pub microphone_channel: Option<u8>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

/// Resolved, clamped runtime parameters of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub tick_interval: Duration,
    pub min_green_ms: u64,
    pub max_green_ms: u64,
    pub phase: PhaseSettings,
    pub sensing_interval_ms: u64,
    pub diagnostics_interval_ms: u64,
    pub detection_threshold_mm: u16,
    pub siren: SirenSettings,
    pub sample_spacing: Duration,
    pub siren_direction: Direction,
    pub alert_duration_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            min_green_ms: DEFAULT_MIN_GREEN_MS,
            max_green_ms: DEFAULT_MAX_GREEN_MS,
            phase: PhaseSettings::default(),
            sensing_interval_ms: DEFAULT_SENSING_INTERVAL_MS,
            diagnostics_interval_ms: DEFAULT_DIAGNOSTICS_INTERVAL_MS,
            detection_threshold_mm: DEFAULT_DETECTION_THRESHOLD_MM,
            siren: SirenSettings::default(),
            sample_spacing: Duration::from_micros(DEFAULT_SAMPLE_SPACING_US),
            siren_direction: DEFAULT_SIREN_DIRECTION,
            alert_duration_ms: DEFAULT_ALERT_DURATION_MS,
        }
    }
}

impl Config {
    /// Returns the log level name (default: "info")
    pub fn log_level(&self) -> &str {
        let level = self.logging.level.trim();
        if level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            level
        }
    }

    pub fn hardware(&self) -> Option<&HardwareSection> {
        self.hardware.as_ref()
    }

    /// Returns the XSHUT pins per direction, if range sensors are wired.
    pub fn xshut_pins(&self) -> Option<DirectionMap<u8>> {
        self.hardware
            .as_ref()
            .and_then(|hardware| hardware.xshut_pins)
            .map(|pins| pins.to_map())
    }

    pub fn rfid_uart(&self) -> Option<&Path> {
        let path = self.hardware.as_ref()?.rfid_uart.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn microphone_channel(&self) -> Option<u8> {
        self.hardware.as_ref()?.microphone_channel
    }

    /// Resolve every controller parameter, applying defaults and clamping
    /// values that would produce out-of-range timing.
    pub fn controller_settings(&self) -> ControllerSettings {
        let defaults = ControllerSettings::default();
        let timing = self.timing.clone().unwrap_or_default();
        let presence = self.presence.clone().unwrap_or_default();
        let siren = self.siren.clone().unwrap_or_default();
        let emergency = self.emergency.clone().unwrap_or_default();

        let min_green_ms = timing.min_green_ms.unwrap_or(defaults.min_green_ms).max(1);
        let max_green_ms = timing
            .max_green_ms
            .unwrap_or(defaults.max_green_ms)
            .max(min_green_ms);

        let band_low_hz = siren.band_low_hz.unwrap_or(defaults.siren.band_low_hz).max(0.0);
        let band_high_hz = siren
            .band_high_hz
            .unwrap_or(defaults.siren.band_high_hz)
            .max(band_low_hz);

        ControllerSettings {
            tick_interval: Duration::from_millis(
                timing.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS).max(1),
            ),
            min_green_ms,
            max_green_ms,
            phase: PhaseSettings {
                yellow_ms: timing.yellow_ms.unwrap_or(DEFAULT_YELLOW_MS),
                all_red_ms: timing
                    .all_red_ms
                    .unwrap_or(DEFAULT_ALL_RED_MS)
                    .min(MAX_ALL_RED_MS),
            },
            sensing_interval_ms: timing
                .sensing_interval_ms
                .unwrap_or(defaults.sensing_interval_ms),
            diagnostics_interval_ms: timing
                .diagnostics_interval_ms
                .unwrap_or(defaults.diagnostics_interval_ms)
                .max(1),
            detection_threshold_mm: presence
                .detection_threshold_mm
                .unwrap_or(defaults.detection_threshold_mm),
            siren: SirenSettings {
                sample_count: siren
                    .sample_count
                    .unwrap_or(defaults.siren.sample_count)
                    .max(1),
                band_low_hz,
                band_high_hz,
                min_strength: siren
                    .min_strength
                    .unwrap_or(defaults.siren.min_strength)
                    .max(0.0),
                calibration_scans: siren
                    .calibration_scans
                    .unwrap_or(defaults.siren.calibration_scans)
                    .max(1),
            },
            sample_spacing: Duration::from_micros(
                siren.sample_spacing_us.unwrap_or(DEFAULT_SAMPLE_SPACING_US),
            ),
            siren_direction: siren.direction.unwrap_or(defaults.siren_direction),
            alert_duration_ms: emergency
                .alert_duration_ms
                .unwrap_or(defaults.alert_duration_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp_config(name: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("intersection-config-{name}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    const MINIMAL: &str = r#"
[app]
name = "intersection-flow"

[logging]
level = "info"
"#;

    #[test]
    fn default_config_wires_all_peripherals() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert!(config.hardware().is_some());
        assert!(config.xshut_pins().is_some());
        assert!(config.rfid_uart().is_some());
        assert!(config.microphone_channel().is_some());
        Ok(())
    }

    #[test]
    fn default_config_matches_built_in_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.controller_settings(), ControllerSettings::default());
        Ok(())
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("minimal", MINIMAL)?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(result.hardware().is_none());
        assert!(result.xshut_pins().is_none());
        assert_eq!(result.log_level(), "info");
        assert_eq!(result.controller_settings(), ControllerSettings::default());
        Ok(())
    }

    #[test]
    fn out_of_range_timing_is_clamped() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}\n[timing]\nmin_green_ms = 9000\nmax_green_ms = 4000\nall_red_ms = 60000\ntick_interval_ms = 0\n"
        );
        let path = write_temp_config("clamped", &contents)?;

        let settings = load_from_path(&path)?.controller_settings();
        let _ = fs::remove_file(&path);

        assert_eq!(settings.min_green_ms, 9000);
        assert_eq!(settings.max_green_ms, 9000);
        assert_eq!(settings.phase.all_red_ms, MAX_ALL_RED_MS);
        assert_eq!(settings.tick_interval, Duration::from_millis(1));
        Ok(())
    }

    #[test]
    fn siren_direction_is_parsed() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!("{MINIMAL}\n[siren]\ndirection = \"west\"\n");
        let path = write_temp_config("siren", &contents)?;

        let settings = load_from_path(&path)?.controller_settings();
        let _ = fs::remove_file(&path);

        assert_eq!(settings.siren_direction, Direction::West);
        Ok(())
    }

    #[test]
    fn lights_require_every_direction() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}\n[hardware.lights]\nnorth = {{ red = 1, yellow = 2, green = 3 }}\nsouth = {{ red = 4, yellow = 5, green = 6 }}\neast = {{ red = 7, yellow = 8, green = 9 }}\n"
        );
        let path = write_temp_config("lights", &contents)?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }

    #[test]
    fn empty_rfid_path_is_treated_as_missing() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}\n[hardware]\nrfid_uart = \"\"\n\n[hardware.lights]\nnorth = {{ red = 1, yellow = 2, green = 3 }}\nsouth = {{ red = 4, yellow = 5, green = 6 }}\neast = {{ red = 7, yellow = 8, green = 9 }}\nwest = {{ red = 10, yellow = 11, green = 12 }}\n"
        );
        let path = write_temp_config("rfid", &contents)?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(result.rfid_uart().is_none());
        let lights = result.hardware().map(|hardware| hardware.lights.to_map());
        assert_eq!(lights.map(|lights| lights[Direction::West].green), Some(12));
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("intersection-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
