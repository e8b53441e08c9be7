//! Deterministic transport double for tests.
//!
//! A [`ScriptedTransport`] replays batches of transport events pushed on its
//! [`ScriptHandle`] and records every transmitted line, so tests can drive a
//! full backend + executor stack without touching real sockets.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::NetworkError;
use crate::time::LocalDuration;
use crate::transport::{Transport, TransportEvent};

#[derive(Default)]
struct ScriptState {
    batches: VecDeque<Vec<TransportEvent>>,
    transmissions: Vec<(u64, String)>,
    disconnected: Vec<u64>,
}

/// Handle shared between a test and its [`ScriptedTransport`].
#[derive(Clone, Default)]
pub struct ScriptHandle {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptHandle {
    /// Queues a batch of events the transport will report on its next
    /// `wait()` call.
    pub fn push_batch(&self, batch: Vec<TransportEvent>) {
        self.state.borrow_mut().batches.push_back(batch);
    }

    /// Every line transmitted so far, paired with its client token.
    pub fn transmissions(&self) -> Vec<(u64, String)> {
        self.state.borrow().transmissions.clone()
    }

    /// Drains and returns the recorded transmissions.
    pub fn take_transmissions(&self) -> Vec<(u64, String)> {
        std::mem::take(&mut self.state.borrow_mut().transmissions)
    }

    /// Lines delivered to given client, in transmission order.
    pub fn lines_for(&self, token: u64) -> Vec<String> {
        self.state
            .borrow()
            .transmissions
            .iter()
            .filter(|(recipient, _)| *recipient == token)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Tokens whose connection was dropped, in drop order.
    pub fn disconnected(&self) -> Vec<u64> {
        self.state.borrow().disconnected.clone()
    }
}

/// Transport replaying scripted event batches.
pub struct ScriptedTransport {
    handle: ScriptHandle,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptHandle) {
        let handle = ScriptHandle::default();

        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl Transport for ScriptedTransport {
    fn wait(&mut self, _timeout: Option<LocalDuration>) -> Result<Vec<TransportEvent>, NetworkError> {
        match self.handle.state.borrow_mut().batches.pop_front() {
            Some(batch) => Ok(batch),
            // A hang here would mean the scenario forgot its final Stop
            // event; failing fast keeps the test readable.
            None => panic!("scripted transport ran out of event batches"),
        }
    }

    fn transmit(&mut self, token: u64, message: &Arc<str>) -> Result<(), NetworkError> {
        self.handle
            .state
            .borrow_mut()
            .transmissions
            .push((token, message.to_string()));

        Ok(())
    }

    fn disconnect(&mut self, token: u64) {
        self.handle.state.borrow_mut().disconnected.push(token);
    }
}
