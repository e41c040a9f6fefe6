use crate::calibration::DEFAULT_CALIBRATION_PATH;
use crate::control_table::BAUD_RATE;
use crate::error::GripperResult;
use config::Config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of environment variables overriding configuration values,
/// e.g. `GRIPPER_PORT=/dev/ttyUSB0`.
pub const ENV_PREFIX: &str = "GRIPPER";

/// Where and how to reach the gripper servo.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GripperConfig {
    /// Serial port name, e.g. `COM5` or `/dev/ttyUSB0`.
    pub port: String,
    /// Dynamixel id of the gripper servo.
    pub id: u8,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Status packet timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,
    /// Moving speed used when a command gives none.
    #[serde(default = "default_speed")]
    pub default_speed: u16,
}

fn default_baud_rate() -> u32 {
    BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from(DEFAULT_CALIBRATION_PATH)
}

fn default_speed() -> u16 {
    100
}

impl GripperConfig {
    pub fn new(port: impl Into<String>, id: u8) -> Self {
        Self {
            port: port.into(),
            id,
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            calibration_path: default_calibration_path(),
            default_speed: default_speed(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Build the configuration from an optional file and the environment.
///
/// `overrides` are applied last, as `(key, value)` pairs.
pub fn get_configuration(
    path: Option<&Path>,
    overrides: &[(&str, String)],
) -> GripperResult<GripperConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        info!("Using configuration from {:?}", path);
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
    for (key, value) in overrides {
        builder = builder.set_override(*key, value.as_str())?;
    }
    Ok(builder.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn file_with_defaults() {
        let dir = TempDir::new("config").unwrap();
        let path = dir.path().join("gripper.yaml");
        std::fs::write(&path, "port: /dev/ttyUSB1\nid: 3\n").unwrap();

        let config = get_configuration(Some(&path), &[]).unwrap();
        assert_eq!(config, GripperConfig::new("/dev/ttyUSB1", 3));
        assert_eq!(config.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn overrides_win() {
        let dir = TempDir::new("config").unwrap();
        let path = dir.path().join("gripper.toml");
        std::fs::write(&path, "port = \"COM5\"\nid = 3\ndefault_speed = 80\n").unwrap();

        let config = get_configuration(
            Some(&path),
            &[("id", "7".to_string()), ("calibration_path", "hand.csv".to_string())],
        )
        .unwrap();
        assert_eq!(config.port, "COM5");
        assert_eq!(config.id, 7);
        assert_eq!(config.default_speed, 80);
        assert_eq!(config.calibration_path, PathBuf::from("hand.csv"));
    }

    #[test]
    fn port_is_required() {
        assert!(get_configuration(None, &[("id", "1".to_string())]).is_err());
    }
}
