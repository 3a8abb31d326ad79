//! ECU Simulator Core Library
//!
//! A minimal automotive ECU: it listens on a CAN bus, interprets a fixed set of
//! message identifiers, and reacts to the ignition control message by starting
//! or stopping a background thread that transmits fluctuating sensor
//! telemetry.
//!
//! # Architecture
//!
//! - `signals`: the compiled-in signal table (ID → name, length, layout)
//! - `decoder`: turns a raw frame into text, or rejects it as too short
//! - `generator`: samples sensor values and sends them while the ignition is on
//! - `ignition`: the OFF/ON state machine that owns the generator threads
//! - `receiver`: the main loop tying the above to a bus connection
//! - `transport`: SocketCAN (Linux) and an in-memory virtual bus
//!
//! Process setup, logging initialization and configuration files live in the
//! application layer (ecu-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use ecu_core::{EcuConfig, MemoryBus, ReceiveLoop};
//! use std::sync::Arc;
//!
//! let bus = MemoryBus::new();
//! let config = EcuConfig::new().with_telemetry_interval_ms(500);
//!
//! let mut ecu = ReceiveLoop::connect(Arc::new(bus), &config).unwrap();
//! let stats = ecu.run(|report| println!("{}", report)).unwrap();
//! println!("{} frames received", stats.received);
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod generator;
pub mod ignition;
pub mod receiver;
pub mod signals;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::EcuConfig;
pub use decoder::Decoder;
pub use generator::{GeneratorHandle, GeneratorReport, SensorSpec, TelemetryGenerator, SENSORS};
pub use ignition::{Ignition, IgnitionCommand, IgnitionController, IgnitionState, Transition};
pub use receiver::{LoopStats, ReceiveLoop};
pub use signals::{SignalDescriptor, SignalKind, SignalTable, TableStats, IGNITION_ID};
#[cfg(target_os = "linux")]
pub use transport::SocketCanTransport;
pub use transport::{Connection, MemoryBus, MemoryConnection, Transport};
pub use types::{Decoded, EcuError, Frame, FrameReport, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
