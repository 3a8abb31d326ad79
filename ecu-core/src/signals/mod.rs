//! Signal table
//!
//! The fixed set of messages the ECU understands and how their payloads are
//! laid out.

pub mod table;

// Re-export key types for convenience
pub use table::{
    SignalDescriptor, SignalKind, SignalTable, TableStats, EXPECTED_LEN, IGNITION_ID,
};
