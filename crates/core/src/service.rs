//! Service contract and the state shared by every service implementation.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::SharedContext;
use crate::event::ServiceEvent;
use crate::handling::HandlingResult;
use crate::ser::BadServiceRequest;
use crate::timer::SharedTimer;

/// Trait-object handle under which services are registered in a SER protocol.
pub type SharedService = Rc<RefCell<dyn Service>>;

/// State composed into every service: the events queue, the run context
/// handle and the watched timer set.
///
/// Each queued event carries the id handed out by the shared context at
/// emission time, which lets the SER protocol drain events across services in
/// their global emission order.
pub struct ServiceCore {
    run_context: SharedContext,
    events_queue: VecDeque<(u64, ServiceEvent)>,
    watched_timers: Vec<SharedTimer>,
}

impl ServiceCore {
    /// Empty events queue, no watched timers.
    pub fn new(run_context: SharedContext) -> Self {
        Self {
            run_context,
            events_queue: VecDeque::new(),
            watched_timers: Vec::new(),
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.run_context
    }

    /// Emits an event, assigning it a fresh context event id.
    pub fn emit(&mut self, event: ServiceEvent) {
        let event_id = self.run_context.borrow_mut().next_event_id();
        self.events_queue.push_back((event_id, event));
    }

    /// Id of the next queued event, if any, without removing it.
    pub fn check_event(&self) -> Option<u64> {
        self.events_queue.front().map(|(id, _)| *id)
    }

    /// Removes and returns the next queued event, if any.
    pub fn take_event(&mut self) -> Option<ServiceEvent> {
        self.events_queue.pop_front().map(|(_, event)| event)
    }

    /// Starts watching given timer so it is reported by `waiting_timers()`.
    ///
    /// # Panics
    ///
    /// Panics if a timer with the same token is already watched.
    pub fn watch_timer(&mut self, timer: SharedTimer) {
        let token = timer.borrow().token();
        if self.watched_timers.iter().any(|watched| watched.borrow().token() == token) {
            panic!("timer with token {} is already watched", token);
        }

        self.watched_timers.push(timer);
    }

    /// Stops watching the timer with given token.
    ///
    /// # Panics
    ///
    /// Panics if no watched timer carries that token.
    pub fn forget_timer(&mut self, token: u64) {
        match self
            .watched_timers
            .iter()
            .position(|watched| watched.borrow().token() == token)
        {
            Some(position) => {
                self.watched_timers.remove(position);
            }
            None => panic!("no watched timer with token {}", token),
        }
    }

    /// Watched timers currently in Ready state, waiting for the backend to
    /// arm their countdown.
    pub fn waiting_timers(&self) -> Vec<SharedTimer> {
        self.watched_timers
            .iter()
            .filter(|timer| timer.borrow().is_waiting_countdown())
            .cloned()
            .collect()
    }
}

/// A named, stateful request handler run by the SER protocol.
///
/// Implementations compose a [`ServiceCore`] and expose it through `core` /
/// `core_mut`; the queue and timer operations the protocol relies on are
/// provided on top of it.
pub trait Service {
    /// Service name, unique within one SER protocol.
    fn name(&self) -> &'static str;

    /// Tries to handle a service request command executed by a given actor.
    ///
    /// Must not perform I/O; may emit events and arm watched timers. Domain
    /// refusals are reported as a failed [`HandlingResult`] (the client gets
    /// a `KO` response); an `Err` means the request data itself is malformed
    /// and disconnects the offending client.
    fn handle_request(
        &mut self,
        actor: u64,
        sr_command_data: &str,
    ) -> Result<HandlingResult, BadServiceRequest>;

    fn core(&self) -> &ServiceCore;
    fn core_mut(&mut self) -> &mut ServiceCore;

    /// Id of the next queued event so the protocol can pick the oldest event
    /// across services.
    fn check_event(&self) -> Option<u64> {
        self.core().check_event()
    }

    /// Removes and returns the next queued event.
    ///
    /// # Panics
    ///
    /// Panics if the events queue is empty; `check_event()` guards the call.
    fn poll_event(&mut self) -> ServiceEvent {
        let name = self.name();
        self.core_mut()
            .take_event()
            .unwrap_or_else(|| panic!("no more events for \"{}\"", name))
    }

    /// Watched timers waiting for their countdown to begin.
    fn waiting_timers(&self) -> Vec<SharedTimer> {
        self.core().waiting_timers()
    }
}
