//! Run context providing event ids and timer tokens to services.
use std::cell::RefCell;
use std::rc::Rc;

/// Context handle shared by every service registered in the same SER
/// protocol, and by the timers they own.
pub type SharedContext = Rc<RefCell<ServiceContext>>;

/// Monotonic id source scoped to one SER subsystem.
///
/// Event ids determine the global order in which the SER protocol drains
/// service events; timer tokens identify timers across the backend boundary.
/// Both counters start at 0 and never decrease within one context. The
/// counters are instance-scoped, not process-global, so several isolated SER
/// subsystems can coexist in one process.
#[derive(Debug, Default)]
pub struct ServiceContext {
    events_count: u64,
    timers_count: u64,
}

impl ServiceContext {
    /// New context with both counters at 0, wrapped for sharing.
    pub fn new() -> SharedContext {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Hands out the next event id.
    ///
    /// Called by `ServiceCore::emit` when an event is pushed; not meant to be
    /// called by services directly.
    pub fn next_event_id(&mut self) -> u64 {
        let id = self.events_count;
        self.events_count += 1;
        id
    }

    /// Hands out the next timer token.
    ///
    /// Called by the `Timer` constructor; not meant to be called by services
    /// directly.
    pub fn next_timer_token(&mut self) -> u64 {
        let token = self.timers_count;
        self.timers_count += 1;
        token
    }
}
