//! Bus transports
//!
//! The ECU only needs three things from a bus: open a connection, send a
//! frame, and receive the next frame. Everything about link naming and socket
//! families stays behind these traits.

use crate::types::{Frame, Result};

#[cfg(target_os = "linux")]
pub mod can_socket;
pub mod memory;

// Re-export transport types
#[cfg(target_os = "linux")]
pub use can_socket::{SocketCanConnection, SocketCanTransport};
pub use memory::{MemoryBus, MemoryConnection};

/// Something that can open connections to a CAN bus
///
/// Implementations must be shareable between the receive loop and the
/// telemetry generator thread.
pub trait Transport: Send + Sync + 'static {
    /// Connection type produced by this transport
    type Connection: Connection;

    /// Open a new connection to the bus
    fn connect(&self) -> Result<Self::Connection>;

    /// Short name for log messages (e.g. the interface name)
    fn name(&self) -> &str;
}

/// An open connection to a CAN bus
pub trait Connection: Send + 'static {
    /// Send one frame
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Block until the next frame arrives
    ///
    /// Returns `Ok(None)` once the bus signals end-of-stream.
    fn receive(&mut self) -> Result<Option<Frame>>;
}
