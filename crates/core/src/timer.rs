//! Countdown timers shared between services and the backend.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::SharedContext;

/// Timer handle shared between the owning service and the backend arming it.
pub type SharedTimer = Rc<RefCell<Timer>>;

/// Lifecycle state of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for the owning service to request a countdown.
    Disabled,
    /// Countdown requested, waiting for the backend to arm it.
    Ready,
    /// Backend began the countdown, waiting for the deadline.
    Pending,
    /// Deadline passed, trigger callbacks have run.
    Triggered,
}

/// Countdown timer identified by a context-provided token.
///
/// The lifecycle is Disabled → Ready → Pending → Triggered, with [`clear`]
/// returning to Disabled from any state. Separating Ready (requested this
/// tick) from Pending (armed by the backend) from Triggered (deadline passed,
/// callback not yet observed) keeps the executor's drain loop deterministic
/// no matter how long request handlers take.
///
/// Callbacks registered for the next Triggered or Disabled transition are
/// consumed when the transition happens; running a callback twice requires
/// registering it twice. Callbacks run synchronously on the executor thread
/// and must not touch the timer they are registered on.
///
/// [`clear`]: Timer::clear
pub struct Timer {
    token: u64,
    countdown_ms: u64,
    state: TimerState,
    trigger_callbacks: Vec<Box<dyn FnOnce()>>,
    clear_callbacks: Vec<Box<dyn FnOnce()>>,
}

impl Timer {
    /// Disabled timer without any callbacks, token provided by the given
    /// context.
    pub fn new(context: &SharedContext, countdown_ms: u64) -> SharedTimer {
        Rc::new(RefCell::new(Self {
            token: context.borrow_mut().next_timer_token(),
            countdown_ms,
            state: TimerState::Disabled,
            trigger_callbacks: Vec::new(),
            clear_callbacks: Vec::new(),
        }))
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Countdown in milliseconds the timer stays pending once armed.
    pub fn countdown(&self) -> u64 {
        self.countdown_ms
    }

    /// Checks if current state is Disabled.
    pub fn is_free(&self) -> bool {
        self.state == TimerState::Disabled
    }

    /// Checks if current state is Ready.
    pub fn is_waiting_countdown(&self) -> bool {
        self.state == TimerState::Ready
    }

    /// Checks if current state is Pending.
    pub fn is_pending(&self) -> bool {
        self.state == TimerState::Pending
    }

    /// Checks if current state is Triggered.
    pub fn has_triggered(&self) -> bool {
        self.state == TimerState::Triggered
    }

    /// Calls given routine next time, and only next time, the state is
    /// updated to Triggered.
    pub fn on_next_trigger(&mut self, callback: impl FnOnce() + 'static) {
        self.trigger_callbacks.push(Box::new(callback));
    }

    /// Calls given routine next time, and only next time, the state is
    /// updated to Disabled.
    pub fn on_next_clear(&mut self, callback: impl FnOnce() + 'static) {
        self.clear_callbacks.push(Box::new(callback));
    }

    fn expect_state(&self, operation: &str, expected: TimerState) {
        if self.state != expected {
            panic!(
                "{}: expected state {:?}, current state is {:?}",
                operation, expected, self.state
            );
        }
    }

    /// Cancels the timer, no matter its current state.
    ///
    /// Pending trigger callbacks are discarded; clear callbacks run and are
    /// emptied.
    pub fn clear(&mut self) {
        self.state = TimerState::Disabled;
        self.trigger_callbacks.clear();

        let fired: Vec<_> = self.clear_callbacks.drain(..).collect();
        for callback in fired {
            callback();
        }
    }

    /// Marks the timer as Ready.
    ///
    /// # Panics
    ///
    /// Panics if the timer is not Disabled.
    pub fn request_countdown(&mut self) {
        self.expect_state("request_countdown", TimerState::Disabled);
        self.state = TimerState::Ready;
    }

    /// Marks the timer as Pending and retrieves the countdown the backend
    /// must measure.
    ///
    /// # Panics
    ///
    /// Panics if the timer is not Ready.
    pub fn begin_countdown(&mut self) -> u64 {
        self.expect_state("begin_countdown", TimerState::Ready);
        self.state = TimerState::Pending;

        self.countdown_ms
    }

    /// Marks the timer as Triggered, running and consuming the trigger
    /// callbacks.
    ///
    /// # Panics
    ///
    /// Panics if the timer is not Pending.
    pub fn trigger(&mut self) {
        self.expect_state("trigger", TimerState::Pending);
        self.state = TimerState::Triggered;

        let fired: Vec<_> = self.trigger_callbacks.drain(..).collect();
        for callback in fired {
            callback();
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("token", &self.token)
            .field("countdown_ms", &self.countdown_ms)
            .field("state", &self.state)
            .field("trigger_callbacks", &self.trigger_callbacks.len())
            .field("clear_callbacks", &self.clear_callbacks.len())
            .finish()
    }
}
