//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{MspError, Result};
use crate::msp::protocol::MspCommand;
use crate::telemetry::TELEMETRY_COMMANDS;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rc: RcConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_wakeup_delay_ms")]
    pub wakeup_delay_ms: u64,
}

/// Exchange configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_exchange_timeout_ms")]
    pub exchange_timeout_ms: u64,
}

/// RC channel range configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RcConfig {
    #[serde(default = "default_throttle_min")]
    pub throttle_min: u16,

    #[serde(default = "default_throttle_max")]
    pub throttle_max: u16,

    #[serde(default = "default_center")]
    pub center: u16,
}

/// Arm / disarm / auto-level sequence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SequenceConfig {
    #[serde(default = "default_retransmit_interval_ms")]
    pub retransmit_interval_ms: u64,

    #[serde(default = "default_arm_duration_ms")]
    pub arm_duration_ms: u64,

    #[serde(default = "default_disarm_duration_ms")]
    pub disarm_duration_ms: u64,

    #[serde(default = "default_auto_level_duration_ms")]
    pub auto_level_duration_ms: u64,

    #[serde(default = "default_min_throttle")]
    pub min_throttle: u16,
}

/// Telemetry polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_telemetry_commands")]
    pub commands: Vec<String>,

    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_wakeup_delay_ms() -> u64 { 1000 }

fn default_exchange_timeout_ms() -> u64 { 1000 }

fn default_throttle_min() -> u16 { 1000 }
fn default_throttle_max() -> u16 { 2000 }
fn default_center() -> u16 { 1500 }

fn default_retransmit_interval_ms() -> u64 { 50 }
fn default_arm_duration_ms() -> u64 { 2000 }
fn default_disarm_duration_ms() -> u64 { 1000 }
fn default_auto_level_duration_ms() -> u64 { 500 }
fn default_min_throttle() -> u16 { 1000 }

fn default_poll_interval_ms() -> u64 { 100 }
fn default_telemetry_commands() -> Vec<String> {
    vec!["attitude".to_string(), "raw_imu".to_string()]
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            wakeup_delay_ms: default_wakeup_delay_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange_timeout_ms: default_exchange_timeout_ms(),
        }
    }
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            throttle_min: default_throttle_min(),
            throttle_max: default_throttle_max(),
            center: default_center(),
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            retransmit_interval_ms: default_retransmit_interval_ms(),
            arm_duration_ms: default_arm_duration_ms(),
            disarm_duration_ms: default_disarm_duration_ms(),
            auto_level_duration_ms: default_auto_level_duration_ms(),
            min_throttle: default_min_throttle(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            commands: default_telemetry_commands(),
            log_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }
}

impl SequenceConfig {
    pub fn retransmit_interval(&self) -> Duration {
        Duration::from_millis(self.retransmit_interval_ms)
    }
}

impl TelemetryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Configured command names resolved to telemetry commands
    ///
    /// # Errors
    ///
    /// Returns error if a name is not one of the telemetry queries.
    pub fn resolve_commands(&self) -> Result<Vec<MspCommand>> {
        self.commands
            .iter()
            .map(|name| {
                command_by_name(name).ok_or_else(|| {
                    MspError::Config(toml::de::Error::custom(format!(
                        "unknown telemetry command '{}'",
                        name
                    )))
                })
            })
            .collect()
    }
}

/// Look up a telemetry command by its lowercase name (e.g. `raw_gps`)
pub fn command_by_name(name: &str) -> Option<MspCommand> {
    TELEMETRY_COMMANDS
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(command, _)| *command)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use msp_client::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 250000, 500000, 1000000]
            .contains(&self.serial.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 250000, 500000, 1000000",
            ));
        }

        if self.serial.wakeup_delay_ms > 10000 {
            return Err(invalid("wakeup_delay_ms must be at most 10000"));
        }

        if self.session.exchange_timeout_ms == 0 || self.session.exchange_timeout_ms > 10000 {
            return Err(invalid("exchange_timeout_ms must be between 1 and 10000"));
        }

        // Channel range
        if self.rc.throttle_min < 1000 || self.rc.throttle_min > 1500 {
            return Err(invalid("throttle_min must be between 1000 and 1500"));
        }

        if self.rc.throttle_max < 1500 || self.rc.throttle_max > 2000 {
            return Err(invalid("throttle_max must be between 1500 and 2000"));
        }

        if self.rc.throttle_min >= self.rc.throttle_max {
            return Err(invalid("throttle_min must be less than throttle_max"));
        }

        if self.rc.center < self.rc.throttle_min || self.rc.center > self.rc.throttle_max {
            return Err(invalid(
                "center must be within throttle range (throttle_min to throttle_max)",
            ));
        }

        // Sequences
        if self.sequence.retransmit_interval_ms == 0 || self.sequence.retransmit_interval_ms > 1000 {
            return Err(invalid("retransmit_interval_ms must be between 1 and 1000"));
        }

        for (name, value) in [
            ("arm_duration_ms", self.sequence.arm_duration_ms),
            ("disarm_duration_ms", self.sequence.disarm_duration_ms),
            ("auto_level_duration_ms", self.sequence.auto_level_duration_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(&format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.sequence.min_throttle < self.rc.throttle_min
            || self.sequence.min_throttle > self.rc.throttle_max
        {
            return Err(invalid(
                "min_throttle must be within throttle range (throttle_min to throttle_max)",
            ));
        }

        // Telemetry
        if self.telemetry.poll_interval_ms == 0 || self.telemetry.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.commands.is_empty() {
            return Err(invalid("telemetry commands cannot be empty"));
        }

        self.telemetry.resolve_commands()?;

        if matches!(&self.telemetry.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("telemetry log_dir cannot be empty when set"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> MspError {
    MspError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyAMA0"

[session]
exchange_timeout_ms = 250

[sequence]

[telemetry]
commands = ["attitude", "raw_gps", "pid"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.session.exchange_timeout(), Duration::from_millis(250));
        assert_eq!(config.rc.center, 1500);
        assert_eq!(
            config.telemetry.resolve_commands().unwrap(),
            vec![MspCommand::Attitude, MspCommand::RawGps, MspCommand::Pid]
        );
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        // The shipped file spells out every default
        assert_eq!(config.serial.port, defaults.serial.port);
        assert_eq!(config.serial.baud_rate, defaults.serial.baud_rate);
        assert_eq!(config.serial.wakeup_delay_ms, defaults.serial.wakeup_delay_ms);
        assert_eq!(
            config.session.exchange_timeout_ms,
            defaults.session.exchange_timeout_ms
        );
        assert_eq!(config.rc.throttle_min, defaults.rc.throttle_min);
        assert_eq!(config.rc.throttle_max, defaults.rc.throttle_max);
        assert_eq!(config.rc.center, defaults.rc.center);
        assert_eq!(
            config.sequence.retransmit_interval_ms,
            defaults.sequence.retransmit_interval_ms
        );
        assert_eq!(config.sequence.arm_duration_ms, defaults.sequence.arm_duration_ms);
        assert_eq!(
            config.sequence.disarm_duration_ms,
            defaults.sequence.disarm_duration_ms
        );
        assert_eq!(
            config.sequence.auto_level_duration_ms,
            defaults.sequence.auto_level_duration_ms
        );
        assert_eq!(config.sequence.min_throttle, defaults.sequence.min_throttle);
        assert_eq!(
            config.telemetry.poll_interval_ms,
            defaults.telemetry.poll_interval_ms
        );
        assert_eq!(config.telemetry.commands, defaults.telemetry.commands);
        assert_eq!(config.telemetry.log_dir, defaults.telemetry.log_dir);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.sequence.retransmit_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/msp-client.toml"),
            Err(MspError::Io(_))
        ));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[9600, 57600, 115200, 230400, 1000000] {
            let mut config = create_valid_config();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_wakeup_delay_too_high() {
        let mut config = create_valid_config();
        config.serial.wakeup_delay_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exchange_timeout_zero() {
        let mut config = create_valid_config();
        config.session.exchange_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exchange_timeout_too_high() {
        let mut config = create_valid_config();
        config.session.exchange_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_throttle_min_too_low() {
        let mut config = create_valid_config();
        config.rc.throttle_min = 999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_throttle_max_too_high() {
        let mut config = create_valid_config();
        config.rc.throttle_max = 2001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_throttle_min_equals_max() {
        let mut config = create_valid_config();
        config.rc.throttle_min = 1500;
        config.rc.throttle_max = 1500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_center_outside_range() {
        let mut config = create_valid_config();
        config.rc.throttle_min = 1100;
        config.rc.center = 1050;
        config.sequence.min_throttle = 1100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retransmit_interval_zero() {
        let mut config = create_valid_config();
        config.sequence.retransmit_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arm_duration_zero() {
        let mut config = create_valid_config();
        config.sequence.arm_duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disarm_duration_too_high() {
        let mut config = create_valid_config();
        config.sequence.disarm_duration_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_throttle_outside_range() {
        let mut config = create_valid_config();
        config.rc.throttle_min = 1100;
        config.sequence.min_throttle = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = create_valid_config();
        config.telemetry.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_telemetry_command() {
        let mut config = create_valid_config();
        config.telemetry.commands = vec!["attitude".to_string(), "set_raw_rc".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_telemetry_commands() {
        let mut config = create_valid_config();
        config.telemetry.commands.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_set() {
        let mut config = create_valid_config();
        config.telemetry.log_dir = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_by_name() {
        assert_eq!(command_by_name("altitude"), Some(MspCommand::Altitude));
        assert_eq!(command_by_name("rc"), Some(MspCommand::Rc));
        assert_eq!(command_by_name("eeprom_write"), None);
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_wakeup_delay_ms(), 1000);
        assert_eq!(default_exchange_timeout_ms(), 1000);
        assert_eq!(default_throttle_min(), 1000);
        assert_eq!(default_throttle_max(), 2000);
        assert_eq!(default_center(), 1500);
        assert_eq!(default_retransmit_interval_ms(), 50);
        assert_eq!(default_arm_duration_ms(), 2000);
        assert_eq!(default_disarm_duration_ms(), 1000);
        assert_eq!(default_auto_level_duration_ms(), 500);
        assert_eq!(default_min_throttle(), 1000);
        assert_eq!(default_poll_interval_ms(), 100);
    }
}
