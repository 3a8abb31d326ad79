//! Compiled-in signal table
//!
//! Maps every CAN identifier the ECU understands to its descriptor. The
//! table is a static list; there is no file format behind it.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::MAX_PAYLOAD;

/// Identifier of the ignition control message
pub const IGNITION_ID: u32 = 0x100;

/// Payload length every table entry expects
pub const EXPECTED_LEN: u8 = 8;

/// How the payload of a message is laid out and rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalKind {
    /// On/off switch in byte 0 (1 = ON, anything else = OFF)
    Switch { label: &'static str },
    /// Unsigned 16-bit value, big-endian in bytes 0-1
    BigEndian16 {
        label: &'static str,
        unit: &'static str,
    },
    /// Unsigned 8-bit value in byte 0
    Byte {
        label: &'static str,
        unit: &'static str,
    },
}

impl SignalKind {
    /// Human readable label of the signal
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::Switch { label }
            | SignalKind::BigEndian16 { label, .. }
            | SignalKind::Byte { label, .. } => *label,
        }
    }

    /// Extract the raw value from a payload
    ///
    /// Returns `None` when the payload is too short for the layout.
    pub fn raw_value(&self, payload: &[u8]) -> Option<u16> {
        match self {
            SignalKind::Switch { .. } | SignalKind::Byte { .. } => {
                payload.first().map(|&b| b as u16)
            }
            SignalKind::BigEndian16 { .. } => {
                if payload.len() < 2 {
                    return None;
                }
                Some(BigEndian::read_u16(&payload[..2]))
            }
        }
    }

    /// Render a payload as text
    pub fn render(&self, payload: &[u8]) -> Option<String> {
        let value = self.raw_value(payload)?;
        let text = match self {
            SignalKind::Switch { label } => {
                let state = if value == 1 { "ON" } else { "OFF" };
                format!("{} {}", label, state)
            }
            SignalKind::BigEndian16 { label, unit } => format!("{}: {} {}", label, value, unit),
            SignalKind::Byte { label, unit } => format!("{}: {}{}", label, value, unit),
        };
        Some(text)
    }

    /// Encode a value into a full 8-byte payload
    ///
    /// Byte-sized kinds keep only the low byte of `value`.
    pub fn encode(&self, value: u16) -> [u8; MAX_PAYLOAD] {
        let mut data = [0u8; MAX_PAYLOAD];
        match self {
            SignalKind::Switch { .. } | SignalKind::Byte { .. } => data[0] = value as u8,
            SignalKind::BigEndian16 { .. } => BigEndian::write_u16(&mut data[..2], value),
        }
        data
    }
}

/// A message understood by the ECU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: &'static str,
    /// Required payload length in bytes
    pub expected_len: u8,
    /// Payload layout
    pub kind: SignalKind,
}

impl SignalDescriptor {
    /// Render the first `expected_len` bytes of a payload
    pub fn decode(&self, payload: &[u8]) -> Option<String> {
        let end = (self.expected_len as usize).min(payload.len());
        self.kind.render(&payload[..end])
    }
}

static SIGNALS: [SignalDescriptor; 8] = [
    SignalDescriptor {
        id: IGNITION_ID,
        name: "EngineOnOff",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::Switch { label: "Engine" },
    },
    SignalDescriptor {
        id: 0x101,
        name: "FrontLight",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::Switch {
            label: "Front Light",
        },
    },
    SignalDescriptor {
        id: 0x200,
        name: "EngineTempSensor",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::BigEndian16 {
            label: "Engine Temperature",
            unit: "°C",
        },
    },
    SignalDescriptor {
        id: 0x201,
        name: "InjectorTimingSensor",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::BigEndian16 {
            label: "Injector Timing",
            unit: "ms",
        },
    },
    SignalDescriptor {
        id: 0x202,
        name: "OxygenSensor",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::Byte {
            label: "Oxygen Sensor",
            unit: "%",
        },
    },
    SignalDescriptor {
        id: 0x203,
        name: "FuelTankLevel",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::Byte {
            label: "Fuel Tank Level",
            unit: "%",
        },
    },
    SignalDescriptor {
        id: 0x204,
        name: "ThrottlePosition",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::Byte {
            label: "Throttle Position",
            unit: "%",
        },
    },
    SignalDescriptor {
        id: 0x205,
        name: "EngineRPM",
        expected_len: EXPECTED_LEN,
        kind: SignalKind::BigEndian16 {
            label: "Engine RPM",
            unit: "rpm",
        },
    },
];

/// The signal table: identifier to descriptor
#[derive(Debug, Clone)]
pub struct SignalTable {
    by_id: HashMap<u32, &'static SignalDescriptor>,
}

impl SignalTable {
    /// Build the table from the compiled-in descriptors
    pub fn standard() -> Self {
        let by_id = SIGNALS.iter().map(|desc| (desc.id, desc)).collect();
        Self { by_id }
    }

    /// Look up a descriptor by CAN ID
    pub fn lookup(&self, id: u32) -> Option<&'static SignalDescriptor> {
        self.by_id.get(&id).copied()
    }

    /// All descriptors in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = &'static SignalDescriptor> {
        SIGNALS.iter()
    }

    /// All known CAN IDs, sorted
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Table statistics
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            num_messages: self.by_id.len(),
            ..TableStats::default()
        };
        for desc in self.by_id.values() {
            match desc.kind {
                SignalKind::Switch { .. } => stats.num_switches += 1,
                SignalKind::BigEndian16 { .. } | SignalKind::Byte { .. } => {
                    stats.num_sensors += 1
                }
            }
        }
        stats
    }
}

impl Default for SignalTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Signal table statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Total number of messages
    pub num_messages: usize,
    /// On/off control messages
    pub num_switches: usize,
    /// Numeric sensor messages
    pub num_sensors: usize,
}
