//! Receive loop
//!
//! Pulls frames from the bus, hands ignition control frames to the
//! controller, and decodes every frame it accepts. Short frames are logged
//! and skipped; the loop only ends when the bus does.

use serde::Serialize;
use std::sync::Arc;

use crate::config::EcuConfig;
use crate::decoder::Decoder;
use crate::ignition::{Ignition, IgnitionController, Transition};
use crate::transport::{Connection, Transport};
use crate::types::{EcuError, Frame, FrameReport, Result};

/// Counters kept by the receive loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Frames read from the bus
    pub received: u64,
    /// Frames that passed the length check
    pub accepted: u64,
    /// Frames rejected as too short
    pub rejected: u64,
    /// Accepted frames with an unknown ID
    pub unrecognized: u64,
    /// Ignition state changes (either direction)
    pub ignition_changes: u64,
}

/// The ECU's main loop over one RX connection
pub struct ReceiveLoop<T: Transport> {
    conn: T::Connection,
    decoder: Decoder,
    controller: IgnitionController<T>,
    stats: LoopStats,
}

impl<T: Transport> ReceiveLoop<T> {
    /// Open the RX connection and set up the controller
    ///
    /// A connect failure is returned to the caller; without a bus there is
    /// nothing to run.
    pub fn connect(transport: Arc<T>, config: &EcuConfig) -> Result<Self> {
        log::info!("Opening RX connection on {}", transport.name());
        let conn = transport.connect()?;
        log::info!("Listening on {}", transport.name());

        Ok(Self::with_connection(
            conn,
            IgnitionController::new(transport, config.telemetry_interval()),
        ))
    }

    /// Build a loop from an already open connection
    pub fn with_connection(conn: T::Connection, controller: IgnitionController<T>) -> Self {
        Self {
            conn,
            decoder: Decoder::new(),
            controller,
            stats: LoopStats::default(),
        }
    }

    /// Handle one frame
    ///
    /// Ignition frames drive the controller and are decoded like any other
    /// frame. Returns `ShortFrame` for frames under 8 bytes without touching
    /// the ignition state.
    pub fn process_frame(&mut self, frame: Frame) -> Result<FrameReport> {
        self.stats.received += 1;

        let report = match self.decoder.report(frame) {
            Ok(report) => report,
            Err(e) => {
                if matches!(e, EcuError::ShortFrame { .. }) {
                    self.stats.rejected += 1;
                }
                return Err(e);
            }
        };
        self.stats.accepted += 1;

        if !report.decoded.is_recognized() {
            self.stats.unrecognized += 1;
        }

        if let Some(transition) = self.controller.handle_frame(&frame) {
            if !matches!(transition, Transition::Unchanged(_)) {
                self.stats.ignition_changes += 1;
            }
        }

        Ok(report)
    }

    /// Run until end-of-stream, calling `on_frame` for every accepted frame
    ///
    /// # Returns
    /// * `Ok(stats)` when the bus signals end-of-stream
    /// * `Err` when receiving fails
    pub fn run<F>(&mut self, mut on_frame: F) -> Result<LoopStats>
    where
        F: FnMut(&FrameReport),
    {
        loop {
            let frame = match self.conn.receive()? {
                Some(frame) => frame,
                None => {
                    log::info!("Bus closed, receive loop finished");
                    return Ok(self.stats);
                }
            };

            match self.process_frame(frame) {
                Ok(report) => on_frame(&report),
                Err(e @ EcuError::ShortFrame { .. }) => log::warn!("{}", e),
                Err(e) => log::warn!("Skipping frame 0x{:X}: {}", frame.id, e),
            }
        }
    }

    /// Current ignition position
    pub fn ignition(&self) -> Ignition {
        self.controller.state()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn controller(&self) -> &IgnitionController<T> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut IgnitionController<T> {
        &mut self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::IGNITION_ID;
    use crate::transport::MemoryBus;

    fn ecu(bus: &MemoryBus) -> ReceiveLoop<MemoryBus> {
        let config = EcuConfig::new().with_telemetry_interval_ms(10);
        ReceiveLoop::connect(Arc::new(bus.clone()), &config).unwrap()
    }

    #[test]
    fn test_ignition_on_frame() {
        let bus = MemoryBus::new();
        let mut ecu = ecu(&bus);

        let report = ecu
            .process_frame(Frame::full(IGNITION_ID, [1, 0, 0, 0, 0, 0, 0, 0]))
            .unwrap();

        assert_eq!(report.decoded.text(), Some("Engine ON"));
        assert_eq!(ecu.ignition(), Ignition::On);
        assert_eq!(ecu.stats().ignition_changes, 1);
        ecu.controller_mut().shutdown();
    }

    #[test]
    fn test_short_ignition_frame_leaves_state_alone() {
        let bus = MemoryBus::new();
        let mut ecu = ecu(&bus);

        let short = Frame::new(IGNITION_ID, &[1, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            ecu.process_frame(short),
            Err(EcuError::ShortFrame { .. })
        ));
        assert_eq!(ecu.ignition(), Ignition::Off);
        assert_eq!(ecu.stats().rejected, 1);
        assert_eq!(ecu.controller().generators_started(), 0);
    }

    #[test]
    fn test_unrecognized_frame_counts() {
        let bus = MemoryBus::new();
        let mut ecu = ecu(&bus);

        let report = ecu.process_frame(Frame::full(0x999, [0xAA; 8])).unwrap();
        assert!(!report.decoded.is_recognized());
        assert_eq!(ecu.stats().unrecognized, 1);
        assert_eq!(ecu.stats().accepted, 1);
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let bus = MemoryBus::new();
        let mut ecu = ecu(&bus);

        bus.inject(Frame::full(0x202, [95, 0, 0, 0, 0, 0, 0, 0])).unwrap();
        bus.inject(Frame::new(0x200, &[0, 87, 0, 0, 0]).unwrap()).unwrap();
        bus.inject(Frame::full(0x999, [0; 8])).unwrap();
        bus.close();

        let mut lines = Vec::new();
        let stats = ecu.run(|report| lines.push(report.decoded.to_string())).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Oxygen Sensor: 95%");
        assert!(lines[1].starts_with("unrecognized"));
        assert_eq!(stats.received, 3);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.unrecognized, 1);
    }

    #[test]
    fn test_connect_failure_is_returned() {
        let bus = MemoryBus::new();
        bus.set_connect_failure(true);
        let result = ReceiveLoop::connect(Arc::new(bus), &EcuConfig::new());
        assert!(matches!(result, Err(EcuError::TransportConnect(_))));
    }
}
