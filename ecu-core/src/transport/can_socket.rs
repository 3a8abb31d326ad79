//! SocketCAN transport (Linux)
//!
//! Opens raw CAN sockets on a kernel interface such as `vcan0` using the
//! `socketcan` crate. Identifiers up to 0x7FF go out as standard frames,
//! larger ones as extended frames.

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};

use super::{Connection, Transport};
use crate::types::{EcuError, Frame, Result};

const MAX_STANDARD_ID: u32 = 0x7FF;

/// Transport backed by a SocketCAN interface
#[derive(Debug, Clone)]
pub struct SocketCanTransport {
    interface: String,
}

impl SocketCanTransport {
    /// Create a transport for the named interface (e.g. "vcan0")
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

impl Transport for SocketCanTransport {
    type Connection = SocketCanConnection;

    fn connect(&self) -> Result<SocketCanConnection> {
        log::debug!("Opening CAN socket on {}", self.interface);

        let socket = CanSocket::open(&self.interface).map_err(|e| {
            EcuError::TransportConnect(format!("{}: {}", self.interface, e))
        })?;

        Ok(SocketCanConnection {
            socket,
            interface: self.interface.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.interface
    }
}

/// An open raw CAN socket
pub struct SocketCanConnection {
    socket: CanSocket,
    interface: String,
}

impl Connection for SocketCanConnection {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let can_frame = to_can_frame(frame)?;
        self.socket
            .write_frame(&can_frame)
            .map_err(|e| EcuError::TransportSend(format!("{}: {}", self.interface, e)))
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let can_frame = self
            .socket
            .read_frame()
            .map_err(|e| EcuError::TransportReceive(format!("{}: {}", self.interface, e)))?;

        from_can_frame(&can_frame).map(Some)
    }
}

fn to_can_frame(frame: &Frame) -> Result<CanFrame> {
    let id: Id = if frame.id <= MAX_STANDARD_ID {
        StandardId::new(frame.id as u16)
            .map(Id::Standard)
            .ok_or_else(|| EcuError::InvalidFrame(format!("bad standard ID 0x{:X}", frame.id)))?
    } else {
        ExtendedId::new(frame.id)
            .map(Id::Extended)
            .ok_or_else(|| EcuError::InvalidFrame(format!("bad extended ID 0x{:X}", frame.id)))?
    };

    CanFrame::new(id, frame.payload())
        .ok_or_else(|| EcuError::InvalidFrame(format!("cannot build frame 0x{:X}", frame.id)))
}

fn from_can_frame(can_frame: &CanFrame) -> Result<Frame> {
    let id = match can_frame.id() {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw(),
    };
    Frame::new(id, can_frame.data())
}
