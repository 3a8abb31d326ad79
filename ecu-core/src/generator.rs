//! Telemetry generator
//!
//! While the ignition is on, the generator emits one frame per engine sensor
//! every interval, each carrying a value drawn uniformly from the sensor's
//! range. It runs on its own thread with its own bus connection and stops on
//! its own once it sees that its ignition session is over.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ignition::IgnitionState;
use crate::signals::SignalTable;
use crate::transport::{Connection, Transport};
use crate::types::{EcuError, Frame, Result};

/// Value range of one simulated sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSpec {
    /// CAN message ID the value is sent on
    pub id: u32,
    /// Smallest value (inclusive)
    pub min: u16,
    /// Largest value (inclusive)
    pub max: u16,
}

impl SensorSpec {
    /// Draw a value uniformly from the range
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u16 {
        rng.gen_range(self.min..=self.max)
    }

    pub fn contains(&self, value: u16) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Simulated sensors, in transmission order
pub const SENSORS: [SensorSpec; 6] = [
    // Engine temperature, °C
    SensorSpec { id: 0x200, min: 80, max: 100 },
    // Injector timing, ms
    SensorSpec { id: 0x201, min: 60, max: 90 },
    // Oxygen sensor, %
    SensorSpec { id: 0x202, min: 90, max: 100 },
    // Fuel tank level, %
    SensorSpec { id: 0x203, min: 60, max: 80 },
    // Throttle position, %
    SensorSpec { id: 0x204, min: 40, max: 60 },
    // Engine RPM
    SensorSpec { id: 0x205, min: 2500, max: 3000 },
];

/// Sample every sensor once and encode the values as frames
///
/// Payload layout comes from the signal table, so whatever the generator
/// sends decodes back to the same value.
pub fn sample_frames<R: Rng>(table: &SignalTable, rng: &mut R) -> Vec<Frame> {
    SENSORS
        .iter()
        .filter_map(|sensor| {
            let desc = table.lookup(sensor.id)?;
            let value = sensor.sample(rng);
            Some(Frame::full(sensor.id, desc.kind.encode(value)))
        })
        .collect()
}

/// Counters from one generator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorReport {
    /// Ignition session the generator served
    pub session: u64,
    /// Completed emission cycles
    pub cycles: u64,
    /// Frames handed to the bus
    pub frames_sent: u64,
    /// Frames dropped because the send failed
    pub send_failures: u64,
}

/// Emits sensor frames while its ignition session is active
pub struct TelemetryGenerator<C: Connection> {
    conn: C,
    state: Arc<IgnitionState>,
    table: SignalTable,
    session: u64,
    interval: Duration,
    rng: StdRng,
}

impl<C: Connection> TelemetryGenerator<C> {
    /// Create a generator for `session` sending on `conn`
    pub fn new(conn: C, state: Arc<IgnitionState>, session: u64, interval: Duration) -> Self {
        Self {
            conn,
            state,
            table: SignalTable::standard(),
            session,
            interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source (for deterministic tests)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Sample and send one frame per sensor
    ///
    /// Send failures drop the frame and are counted; the cycle goes on.
    pub fn run_cycle(&mut self, report: &mut GeneratorReport) {
        for frame in sample_frames(&self.table, &mut self.rng) {
            match self.conn.send(&frame) {
                Ok(()) => report.frames_sent += 1,
                Err(e) => {
                    log::warn!("Dropped telemetry frame 0x{:X}: {}", frame.id, e);
                    report.send_failures += 1;
                }
            }
        }
        report.cycles += 1;
    }

    /// Emit until the session ends
    ///
    /// The session is checked at the start of every cycle, so an ignition-off
    /// takes effect within one interval.
    pub fn run(mut self) -> GeneratorReport {
        let mut report = GeneratorReport {
            session: self.session,
            ..GeneratorReport::default()
        };

        while self.state.is_session_active(self.session) {
            self.run_cycle(&mut report);
            log::trace!("Telemetry cycle {} sent", report.cycles);
            thread::sleep(self.interval);
        }

        log::info!(
            "Telemetry generator {} stopped after {} cycles ({} frames, {} dropped)",
            self.session,
            report.cycles,
            report.frames_sent,
            report.send_failures
        );
        report
    }
}

/// Handle to a running generator thread
#[derive(Debug)]
pub struct GeneratorHandle {
    session: u64,
    join: JoinHandle<Result<GeneratorReport>>,
}

impl GeneratorHandle {
    /// Launch a generator for `session` on a new thread
    ///
    /// The thread opens its own connection. If that fails, the session is
    /// ended (ignition back to OFF) and the thread exits with the error.
    pub fn spawn<T: Transport>(
        transport: Arc<T>,
        state: Arc<IgnitionState>,
        session: u64,
        interval: Duration,
    ) -> Result<Self> {
        let join = thread::Builder::new()
            .name(format!("telemetry-{}", session))
            .spawn(move || {
                log::info!("Opening telemetry connection on {}", transport.name());
                let conn = match transport.connect() {
                    Ok(conn) => conn,
                    Err(e) => {
                        log::error!("Telemetry generator {} cannot start: {}", session, e);
                        state.end_session(session);
                        return Err(e);
                    }
                };

                log::info!("Telemetry generator {} started", session);
                Ok(TelemetryGenerator::new(conn, state, session, interval).run())
            })?;

        Ok(Self { session, join })
    }

    /// Ignition session this generator serves
    pub fn session(&self) -> u64 {
        self.session
    }

    /// True once the thread has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the thread and collect its report
    pub fn join(self) -> Result<GeneratorReport> {
        let session = self.session;
        self.join
            .join()
            .map_err(|_| EcuError::GeneratorPanicked(session))?
    }
}
