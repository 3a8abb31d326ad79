//! In-process virtual CAN bus
//!
//! Behaves like a virtual CAN interface: a frame sent on one connection is
//! delivered to every other open connection. Used by the test suite and for
//! running the ECU without a kernel CAN interface.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Connection, Transport};
use crate::types::{EcuError, Frame, Result};

/// Shared in-memory bus; clones refer to the same bus
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusInner>>,
}

#[derive(Debug, Default)]
struct BusInner {
    subscribers: Vec<(u64, Sender<Frame>)>,
    next_id: u64,
    closed: bool,
    fail_connect: bool,
}

impl MemoryBus {
    /// Create a new, empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a frame on the bus as an external node would
    ///
    /// Every open connection receives it. Returns the number of receivers.
    pub fn inject(&self, frame: Frame) -> Result<usize> {
        self.deliver(None, frame)
    }

    /// Close the bus: receivers see end-of-stream, sends and connects fail
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
        log::debug!("Memory bus closed");
    }

    /// Make subsequent `connect` calls fail (simulates a missing interface)
    pub fn set_connect_failure(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Number of currently open connections
    pub fn connection_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, from: Option<u64>, frame: Frame) -> Result<usize> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(EcuError::TransportSend("memory bus is closed".to_string()));
        }

        let mut delivered = 0;
        // Drop subscribers whose receiving side went away
        inner.subscribers.retain(|(id, tx)| {
            if Some(*id) == from {
                return true;
            }
            match tx.send(frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });

        Ok(delivered)
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|(sub_id, _)| *sub_id != id);
    }
}

impl Transport for MemoryBus {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        let mut inner = self.lock();
        if inner.fail_connect {
            return Err(EcuError::TransportConnect(
                "memory bus refused connection".to_string(),
            ));
        }
        if inner.closed {
            return Err(EcuError::TransportConnect("memory bus is closed".to_string()));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = mpsc::channel();
        inner.subscribers.push((id, tx));

        Ok(MemoryConnection {
            id,
            bus: self.clone(),
            rx,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A connection to a `MemoryBus`
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    bus: MemoryBus,
    rx: Receiver<Frame>,
}

impl MemoryConnection {
    /// Wait up to `timeout` for the next frame
    ///
    /// Returns `None` on timeout or end-of-stream.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Option<Frame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take every frame that is already queued
    pub fn drain(&mut self) -> Vec<Frame> {
        self.rx.try_iter().collect()
    }
}

impl Connection for MemoryConnection {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        self.bus.deliver(Some(self.id), *frame).map(|_| ())
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        // All senders gone means the bus was closed
        Ok(self.rx.recv().ok())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}
