//! Configuration loading and parsing

use anyhow::{Context, Result};
use ecu_core::EcuConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from ecu.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
        }
    }
}

fn default_interface() -> String {
    "vcan0".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    1000
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Settings handed to the ECU core
    pub fn ecu_config(&self) -> EcuConfig {
        EcuConfig::new()
            .with_interface(self.bus.interface.clone())
            .with_telemetry_interval_ms(self.telemetry.interval_ms)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    anyhow::ensure!(
        config.telemetry.interval_ms > 0,
        "telemetry.interval_ms must be greater than zero in {:?}",
        path
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [bus]
            interface = "can1"

            [telemetry]
            interval_ms = 250

            [output]
            format = "json"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.bus.interface, "can1");
        assert_eq!(config.telemetry.interval_ms, 250);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());

        let ecu = config.ecu_config();
        assert_eq!(ecu.interface, "vcan0");
        assert_eq!(ecu.telemetry_interval_ms, 1000);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bus]\ninterface = \"vcan3\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.bus.interface, "vcan3");
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[telemetry]\ninterval_ms = 0").unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/ecu.toml"));
        assert!(result.is_err());
    }
}
