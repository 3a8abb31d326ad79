//! Ignition state machine
//!
//! Two states, OFF and ON. An ignition-on frame while OFF switches to ON and
//! launches exactly one telemetry generator; an ignition-off frame while ON
//! switches back and lets that generator stop on its own. Repeated commands
//! are no-ops.
//!
//! Every ON interval gets a new session number. A generator keeps running
//! only while the ignition is ON *and* its session is current, so a quick
//! OFF→ON can never leave two generators emitting.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::generator::{GeneratorHandle, GeneratorReport};
use crate::signals::IGNITION_ID;
use crate::transport::Transport;
use crate::types::Frame;

/// Ignition position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Ignition {
    #[default]
    Off,
    On,
}

impl fmt::Display for Ignition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ignition::Off => write!(f, "OFF"),
            Ignition::On => write!(f, "ON"),
        }
    }
}

/// Command carried by an ignition control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnitionCommand {
    On,
    Off,
}

impl IgnitionCommand {
    /// Interpret an ignition control frame
    ///
    /// Byte 0 equal to 1 means ON; any other value means OFF. Returns `None`
    /// for frames with a different ID or an empty payload.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.id != IGNITION_ID {
            return None;
        }
        frame.payload().first().map(|&b| {
            if b == 1 {
                IgnitionCommand::On
            } else {
                IgnitionCommand::Off
            }
        })
    }
}

/// Outcome of applying a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// OFF → ON; a generator was launched for `session`
    Started { session: u64 },
    /// ON → OFF; the generator for `session` will stop
    Stopped { session: u64 },
    /// Command matched the current state
    Unchanged(Ignition),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Inner {
    ignition: Ignition,
    session: u64,
}

/// Shared ignition state
///
/// Owned jointly (via `Arc`) by the controller and the generators. The lock
/// is only ever held for the read-modify-write itself.
#[derive(Debug, Default)]
pub struct IgnitionState {
    inner: Mutex<Inner>,
}

impl IgnitionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ignition position
    pub fn current(&self) -> Ignition {
        self.lock().ignition
    }

    pub fn is_on(&self) -> bool {
        self.current() == Ignition::On
    }

    /// Number of the most recent ON interval (0 before the first one)
    pub fn session(&self) -> u64 {
        self.lock().session
    }

    /// True while the ignition is ON and `session` is the current interval
    pub fn is_session_active(&self, session: u64) -> bool {
        let inner = self.lock();
        inner.ignition == Ignition::On && inner.session == session
    }

    pub(crate) fn apply(&self, command: IgnitionCommand) -> Transition {
        let mut inner = self.lock();
        match (inner.ignition, command) {
            (Ignition::Off, IgnitionCommand::On) => {
                inner.session += 1;
                inner.ignition = Ignition::On;
                Transition::Started {
                    session: inner.session,
                }
            }
            (Ignition::On, IgnitionCommand::Off) => {
                inner.ignition = Ignition::Off;
                Transition::Stopped {
                    session: inner.session,
                }
            }
            (current, _) => Transition::Unchanged(current),
        }
    }

    /// Switch OFF if `session` is still the current ON interval
    pub(crate) fn end_session(&self, session: u64) -> bool {
        let mut inner = self.lock();
        if inner.ignition == Ignition::On && inner.session == session {
            inner.ignition = Ignition::Off;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner is plain Copy data; a panic elsewhere cannot leave it half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives the ignition state machine and owns the telemetry generators
pub struct IgnitionController<T: Transport> {
    state: Arc<IgnitionState>,
    transport: Arc<T>,
    interval: Duration,
    generators: Vec<GeneratorHandle>,
    started: u64,
}

impl<T: Transport> IgnitionController<T> {
    /// Create a controller that launches generators on `transport`
    pub fn new(transport: Arc<T>, interval: Duration) -> Self {
        Self {
            state: Arc::new(IgnitionState::new()),
            transport,
            interval,
            generators: Vec::new(),
            started: 0,
        }
    }

    /// Current ignition position
    pub fn state(&self) -> Ignition {
        self.state.current()
    }

    /// Shared state handle, as seen by the generators
    pub fn shared_state(&self) -> Arc<IgnitionState> {
        Arc::clone(&self.state)
    }

    /// Feed a frame; returns `None` if it is not an ignition control frame
    pub fn handle_frame(&mut self, frame: &Frame) -> Option<Transition> {
        IgnitionCommand::from_frame(frame).map(|command| self.apply(command))
    }

    /// Apply an ignition command
    pub fn apply(&mut self, command: IgnitionCommand) -> Transition {
        self.reap();

        let transition = self.state.apply(command);
        match transition {
            Transition::Started { session } => {
                log::info!("Ignition ON, starting telemetry session {}", session);
                match GeneratorHandle::spawn(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.state),
                    session,
                    self.interval,
                ) {
                    Ok(handle) => {
                        self.generators.push(handle);
                        self.started += 1;
                    }
                    Err(e) => {
                        log::error!("Failed to launch telemetry generator: {}", e);
                        self.state.end_session(session);
                    }
                }
            }
            Transition::Stopped { session } => {
                log::info!("Ignition OFF, telemetry session {} stopping", session);
            }
            Transition::Unchanged(current) => {
                log::debug!("Ignition already {}, command ignored", current);
            }
        }

        transition
    }

    /// Number of generators ever launched
    pub fn generators_started(&self) -> u64 {
        self.started
    }

    /// Generator threads that have not exited yet
    pub fn live_generators(&self) -> usize {
        self.generators.iter().filter(|h| !h.is_finished()).count()
    }

    /// Collect reports from generators that have exited
    pub fn reap(&mut self) -> Vec<GeneratorReport> {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.generators.drain(..).partition(|h| h.is_finished());
        self.generators = running;
        Self::collect(finished)
    }

    /// Switch the ignition OFF and wait for every generator to exit
    ///
    /// Blocks for at most about one telemetry interval.
    pub fn shutdown(&mut self) -> Vec<GeneratorReport> {
        if let Transition::Stopped { session } = self.state.apply(IgnitionCommand::Off) {
            log::info!("Shutting down telemetry session {}", session);
        }
        let handles: Vec<_> = self.generators.drain(..).collect();
        Self::collect(handles)
    }

    fn collect(handles: Vec<GeneratorHandle>) -> Vec<GeneratorReport> {
        handles
            .into_iter()
            .filter_map(|handle| {
                let session = handle.session();
                match handle.join() {
                    Ok(report) => Some(report),
                    Err(e) => {
                        log::warn!("Telemetry session {} ended with error: {}", session, e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl<T: Transport> Drop for IgnitionController<T> {
    fn drop(&mut self) {
        // Generators stop on their own within one interval
        self.state.apply(IgnitionCommand::Off);
    }
}
