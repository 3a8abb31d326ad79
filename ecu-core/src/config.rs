//! ECU configuration types
//!
//! This module defines the small set of knobs the ECU core needs. Loading the
//! values from files or the command line is the application's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the ECU core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcuConfig {
    /// CAN interface name (e.g. "vcan0", "can0")
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Delay between telemetry cycles in milliseconds (default: 1000ms)
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_ms: u64,
}

fn default_interface() -> String {
    "vcan0".to_string()
}

fn default_telemetry_interval() -> u64 {
    1000
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            telemetry_interval_ms: default_telemetry_interval(),
        }
    }
}

impl EcuConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the CAN interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Builder method: set the telemetry interval
    pub fn with_telemetry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.telemetry_interval_ms = interval_ms;
        self
    }

    /// Telemetry interval as a `Duration`
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}
