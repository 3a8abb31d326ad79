//! Core types for the ECU simulator
//!
//! This module defines the frame type exchanged with the transport, the error
//! type shared by every component, and the report the receive loop produces
//! for each accepted frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the simulator
pub type Timestamp = DateTime<Utc>;

/// Result type for ECU operations
pub type Result<T> = std::result::Result<T, EcuError>;

/// Maximum payload of a classic CAN frame
pub const MAX_PAYLOAD: usize = 8;

/// Raw classic CAN frame as received from or sent to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Data length code (0-8)
    pub len: u8,
    /// Payload buffer; bytes beyond `len` are ignored
    pub data: [u8; MAX_PAYLOAD],
}

impl Frame {
    /// Create a frame from an identifier and up to 8 payload bytes
    pub fn new(id: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(EcuError::InvalidFrame(format!(
                "payload of {} bytes exceeds {} for ID 0x{:X}",
                payload.len(),
                MAX_PAYLOAD,
                id
            )));
        }

        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Create a full-length frame from an 8-byte buffer
    pub fn full(id: u32, data: [u8; MAX_PAYLOAD]) -> Self {
        Self {
            id,
            len: MAX_PAYLOAD as u8,
            data,
        }
    }

    /// Payload bytes covered by the data length code
    pub fn payload(&self) -> &[u8] {
        let len = (self.len as usize).min(MAX_PAYLOAD);
        &self.data[..len]
    }

    /// Payload rendered as space separated hex bytes
    pub fn payload_hex(&self) -> String {
        self.payload()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Payload rendered as text, non-printable bytes shown as '.'
    pub fn payload_ascii(&self) -> String {
        self.payload()
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect()
    }
}

/// Errors that can occur in the ECU
#[derive(Debug, thiserror::Error)]
pub enum EcuError {
    #[error("Frame ID 0x{id:X} ignored: DLC {len} is less than 8 bytes")]
    ShortFrame { id: u32, len: u8 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to connect to CAN bus: {0}")]
    TransportConnect(String),

    #[error("Failed to send frame: {0}")]
    TransportSend(String),

    #[error("Failed to receive frame: {0}")]
    TransportReceive(String),

    #[error("Telemetry generator for session {0} panicked")]
    GeneratorPanicked(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interpretation of a single frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded {
    /// Identifier found in the signal table
    Signal {
        /// Message name from the signal table
        name: &'static str,
        /// Human readable value, e.g. "Oxygen Sensor: 95%"
        text: String,
    },
    /// Identifier not in the signal table; only raw bytes are available
    Unrecognized {
        /// Raw payload bytes
        raw: Vec<u8>,
    },
}

impl Decoded {
    /// Decoded text, if the identifier was recognized
    pub fn text(&self) -> Option<&str> {
        match self {
            Decoded::Signal { text, .. } => Some(text.as_str()),
            Decoded::Unrecognized { .. } => None,
        }
    }

    /// Message name, if the identifier was recognized
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Decoded::Signal { name, .. } => Some(*name),
            Decoded::Unrecognized { .. } => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Decoded::Signal { .. })
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Signal { text, .. } => write!(f, "{}", text),
            Decoded::Unrecognized { raw } => {
                write!(f, "unrecognized [")?;
                for (i, b) in raw.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", b)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One accepted frame together with its interpretation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// Wall-clock time the frame was decoded
    pub received_at: Timestamp,
    /// The frame as received
    pub frame: Frame,
    /// Result of the signal table lookup
    pub decoded: Decoded,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03x}\t[{}]\t{}\t'{}'",
            self.frame.id,
            self.frame.len,
            self.frame.payload_hex(),
            self.frame.payload_ascii()
        )?;
        if let Some(text) = self.decoded.text() {
            write!(f, "\t'{}'", text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new_pads_payload() {
        let frame = Frame::new(0x123, &[1, 2, 3]).unwrap();
        assert_eq!(frame.len, 3);
        assert_eq!(frame.data, [1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_frame_new_rejects_oversized_payload() {
        let result = Frame::new(0x123, &[0; 9]);
        assert!(matches!(result, Err(EcuError::InvalidFrame(_))));
    }

    #[test]
    fn test_payload_rendering() {
        let frame = Frame::new(0x7FF, &[0x41, 0x00, 0x7A]).unwrap();
        assert_eq!(frame.payload_hex(), "41 00 7A");
        assert_eq!(frame.payload_ascii(), "A.z");
    }

    #[test]
    fn test_decoded_display() {
        let known = Decoded::Signal {
            name: "FrontLight",
            text: "Front Light ON".to_string(),
        };
        assert_eq!(known.to_string(), "Front Light ON");
        assert!(known.is_recognized());

        let unknown = Decoded::Unrecognized { raw: vec![0xDE, 0xAD] };
        assert_eq!(unknown.to_string(), "unrecognized [DE AD]");
        assert_eq!(unknown.text(), None);
    }

    #[test]
    fn test_frame_report_line() {
        let report = FrameReport {
            received_at: Utc::now(),
            frame: Frame::full(0x100, [1, 0, 0, 0, 0, 0, 0, 0]),
            decoded: Decoded::Signal {
                name: "EngineOnOff",
                text: "Engine ON".to_string(),
            },
        };
        let line = report.to_string();
        assert!(line.starts_with("100\t[8]\t01 00 00 00 00 00 00 00"));
        assert!(line.ends_with("'Engine ON'"));
    }

    #[test]
    fn test_short_frame_error_message() {
        let err = EcuError::ShortFrame { id: 0x200, len: 5 };
        assert_eq!(
            err.to_string(),
            "Frame ID 0x200 ignored: DLC 5 is less than 8 bytes"
        );
    }
}
