//! Service events and executor input events.
use std::collections::HashSet;

use crate::handling::HandlingResult;

/// Outbound event produced by a service, targeted at some or all actors.
///
/// Passing through the SER protocol and the RPTL layer, the same event
/// command gets prefixed by each layer: polled from the SER protocol it
/// becomes `EVENT <service_name> <command>`, and sent on the wire it becomes
/// `SERVICE EVENT <service_name> <command>`.
#[derive(Debug, PartialEq, Eq)]
pub struct ServiceEvent {
    command: String,
    targets: Option<HashSet<u64>>,
}

impl ServiceEvent {
    /// Event received by every registered actor.
    pub fn broadcast(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            targets: None,
        }
    }

    /// Event received only by the listed actors.
    pub fn targeting(command: impl Into<String>, targets: impl IntoIterator<Item = u64>) -> Self {
        Self {
            command: command.into(),
            targets: Some(targets.into_iter().collect()),
        }
    }

    /// New event with given protocol command inserted at the beginning of
    /// the command data, same target set.
    pub fn prefix_with(&self, higher_protocol_prefix: &str) -> Self {
        Self {
            command: format!("{}{}", higher_protocol_prefix, self.command),
            targets: self.targets.clone(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// `true` if every registered actor must receive this event.
    pub fn target_everyone(&self) -> bool {
        self.targets.is_none()
    }

    /// Actors which must receive this event.
    ///
    /// # Panics
    ///
    /// Panics if every registered actor must receive it, that is if
    /// `target_everyone()` is `true`.
    pub fn targets(&self) -> &HashSet<u64> {
        self.targets
            .as_ref()
            .expect("no UIDs provided, everyone must receive this event")
    }
}

/// External event the executor blocks on, returned by
/// [`ServerEndpoint::wait_for_input`](crate::ServerEndpoint::wait_for_input).
#[derive(Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Spurious wakeup, nothing to dispatch.
    None,
    /// A signal asked the server to stop.
    Stop { signal: i32 },
    /// A new actor joined the server.
    Joined { uid: u64, name: String },
    /// An actor left the server, cleanly or after an error.
    Left { uid: u64, reason: HandlingResult },
    /// A registered actor sent a service request.
    ServiceRequest { uid: u64, request: String },
    /// An armed timer reached its deadline; the timer has already
    /// transitioned to Triggered when this event is dispatched.
    TimerTriggered { token: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_targets_everyone() {
        let event = ServiceEvent::broadcast("MESSAGE_FROM 42 hi");

        assert!(event.target_everyone());
        assert_eq!(event.command(), "MESSAGE_FROM 42 hi");
    }

    #[test]
    #[should_panic(expected = "everyone must receive this event")]
    fn targets_panics_on_broadcast() {
        ServiceEvent::broadcast("STOP").targets();
    }

    #[test]
    fn targeting_keeps_uid_set() {
        let event = ServiceEvent::targeting("FIRE", [42, 7]);

        assert!(!event.target_everyone());
        assert_eq!(event.targets(), &HashSet::from([7, 42]));
    }

    #[test]
    fn prefix_inserts_command_and_keeps_targets() {
        let event = ServiceEvent::targeting("MESSAGE_FROM 42 hi", [42]);
        let prefixed = event.prefix_with("EVENT Chat ");

        assert_eq!(prefixed.command(), "EVENT Chat MESSAGE_FROM 42 hi");
        assert_eq!(prefixed.targets(), event.targets());
    }

    #[test]
    fn equality_is_target_order_insensitive() {
        assert_eq!(
            ServiceEvent::targeting("FIRE", [1, 2, 3]),
            ServiceEvent::targeting("FIRE", [3, 2, 1])
        );
        assert_ne!(
            ServiceEvent::broadcast("FIRE"),
            ServiceEvent::targeting("FIRE", [1])
        );
    }
}
