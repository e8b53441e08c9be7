//! Messaging service with a cooldown between sent messages.
use std::rc::Rc;

use parlor_core::{
    BadServiceRequest, HandlingResult, Service, ServiceCore, ServiceEvent, SharedContext,
    SharedTimer, Timer,
};

/// Basic chat: every actor can send a message to everyone, but not faster
/// than the configured cooldown.
///
/// Inbound request data is the raw message; accepted messages are trimmed
/// and broadcast as `MESSAGE_FROM <uid> <message>` events.
pub struct ChatService {
    core: ServiceCore,
    cooldown: SharedTimer,
    cooldown_message: String,
}

impl ChatService {
    /// Chat running inside given context with given minimal delay between
    /// two messages.
    pub fn new(run_context: &SharedContext, cooldown_ms: u64) -> Self {
        let cooldown = Timer::new(run_context, cooldown_ms);
        let mut core = ServiceCore::new(Rc::clone(run_context));
        core.watch_timer(Rc::clone(&cooldown));

        Self {
            core,
            cooldown,
            // The reported delay always matches the configured one.
            cooldown_message: format!("Last message when sent less than {} ms ago", cooldown_ms),
        }
    }
}

impl Service for ChatService {
    fn name(&self) -> &'static str {
        "Chat"
    }

    fn handle_request(
        &mut self,
        actor: u64,
        sr_command_data: &str,
    ) -> Result<HandlingResult, BadServiceRequest> {
        let chat_message = sr_command_data.trim();

        // An "invisible" message, empty once trimmed, is refused.
        if chat_message.is_empty() {
            return Ok(HandlingResult::failure("Message cannot be empty"));
        }

        // A consumed cooldown allows the next message, reset its lifecycle.
        if self.cooldown.borrow().has_triggered() {
            self.cooldown.borrow_mut().clear();
        }

        if !self.cooldown.borrow().is_free() {
            return Ok(HandlingResult::failure(self.cooldown_message.clone()));
        }

        self.core.emit(ServiceEvent::broadcast(format!(
            "MESSAGE_FROM {} {}",
            actor, chat_message
        )));
        self.cooldown.borrow_mut().request_countdown();

        Ok(HandlingResult::success())
    }

    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }
}
