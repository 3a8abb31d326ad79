//! Frame decoder
//!
//! Turns a raw frame into its meaning according to the signal table. Frames
//! shorter than a full 8 bytes are rejected before the table is consulted;
//! identifiers missing from the table still produce a result, just without
//! an interpretation.

use chrono::Utc;

use crate::signals::{SignalDescriptor, SignalTable, EXPECTED_LEN};
use crate::types::{Decoded, EcuError, Frame, FrameReport, Result};

/// Decoder over the compiled-in signal table
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    table: SignalTable,
}

impl Decoder {
    /// Create a decoder over the standard signal table
    pub fn new() -> Self {
        Self {
            table: SignalTable::standard(),
        }
    }

    /// The signal table backing this decoder
    pub fn table(&self) -> &SignalTable {
        &self.table
    }

    /// Decode a frame
    ///
    /// # Returns
    /// * `Err(EcuError::ShortFrame)` if the frame carries fewer than 8 bytes
    /// * `Ok(Decoded::Unrecognized)` if the ID is not in the table
    /// * `Ok(Decoded::Signal)` otherwise
    ///
    /// # Example
    /// ```
    /// use ecu_core::{Decoder, Frame};
    ///
    /// let decoder = Decoder::new();
    /// let frame = Frame::full(0x202, [95, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(decoder.decode_text(&frame).unwrap(), "Oxygen Sensor: 95%");
    /// ```
    pub fn decode(&self, frame: &Frame) -> Result<Decoded> {
        if frame.len < EXPECTED_LEN {
            return Err(EcuError::ShortFrame {
                id: frame.id,
                len: frame.len,
            });
        }

        match self.table.lookup(frame.id) {
            Some(desc) => Ok(Self::decode_known(frame, desc)),
            None => {
                log::trace!("Unknown CAN ID: 0x{:X}, keeping raw bytes", frame.id);
                Ok(Decoded::Unrecognized {
                    raw: frame.payload().to_vec(),
                })
            }
        }
    }

    /// Decode a frame into its display text
    pub fn decode_text(&self, frame: &Frame) -> Result<String> {
        self.decode(frame).map(|decoded| decoded.to_string())
    }

    /// Decode a frame and stamp it with the current time
    pub fn report(&self, frame: Frame) -> Result<FrameReport> {
        let decoded = self.decode(&frame)?;
        Ok(FrameReport {
            received_at: Utc::now(),
            frame,
            decoded,
        })
    }

    fn decode_known(frame: &Frame, desc: &SignalDescriptor) -> Decoded {
        // Length was checked above, so every layout has its bytes
        let text = desc
            .decode(frame.payload())
            .unwrap_or_else(|| format!("{} (undecodable)", desc.name));

        Decoded::Signal {
            name: desc.name,
            text,
        }
    }
}
