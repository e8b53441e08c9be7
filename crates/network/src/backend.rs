//! RPTL backend: client sessions, actor registry and the input events queue.
//!
//! RPTL is the text-line login protocol spoken on the wire. An unregistered
//! client may check the server availability (`CHECKOUT`) or bind an actor
//! (`LOGIN <uid> <name>`); a registered client may forward service requests
//! (`SERVICE <sr>`) or disconnect cleanly (`LOGOUT`). Every protocol
//! violation is caught here and kills the offending client — the executor
//! never sees malformed frames.
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use parlor_core::{HandlingResult, InputEvent, ServerEndpoint, ServiceEvent, SharedTimer, TextParser};

use crate::error::NetworkError;
use crate::time::{LocalDuration, LocalTime, TimeoutManager};
use crate::transport::{Transport, TransportEvent};

/*
 * RPTL command verbs, client-sent then server-sent.
 */

const CHECKOUT_COMMAND: &str = "CHECKOUT";
const LOGIN_COMMAND: &str = "LOGIN";
const LOGOUT_COMMAND: &str = "LOGOUT";
const SERVICE_COMMAND: &str = "SERVICE";

const AVAILABILITY_COMMAND: &str = "AVAILABILITY";
const REGISTRATION_COMMAND: &str = "REGISTRATION";
const LOGGED_IN_COMMAND: &str = "LOGGED_IN";
const LOGGED_OUT_COMMAND: &str = "LOGGED_OUT";
const INTERRUPT_COMMAND: &str = "INTERRUPT";

/// RPTL violation by a client; the error text becomes the disconnection
/// reason of the killed client.
#[derive(Debug, thiserror::Error)]
enum RptlError {
    /// Ill-formed RPTL message.
    #[error("{0}")]
    BadClientMessage(String),

    /// Well-formed registration the server cannot satisfy.
    #[error("{0}")]
    InternalError(String),
}

/// A logged-in participant bound to a client session.
#[derive(Debug)]
struct Actor {
    uid: u64,
    name: String,
}

/// Transport-level connection state.
struct Session {
    alive: bool,
    /// Disconnection outcome, meaningful once `alive` is `false`.
    disconnection_reason: HandlingResult,
    actor: Option<Actor>,
    /// Outbound FIFO; a message targeting several actors shares one buffer
    /// across their queues.
    outbox: VecDeque<Arc<str>>,
}

impl Session {
    fn alive_unregistered() -> Self {
        Self {
            alive: true,
            disconnection_reason: HandlingResult::success(),
            actor: None,
            outbox: VecDeque::new(),
        }
    }
}

/// RPTL state machine over a [`Transport`], implementing the endpoint
/// contract the executor drives.
pub struct NetworkBackend<T: Transport> {
    transport: T,
    actors_limit: usize,
    sessions: HashMap<u64, Session>,
    /// Actor UID to owning client token, iterated in UID order for the
    /// roster snapshot.
    actors_registry: BTreeMap<u64, u64>,
    input_events: VecDeque<InputEvent>,
    timeouts: TimeoutManager<u64>,
    armed_timers: HashMap<u64, SharedTimer>,
    is_closed: bool,
}

impl<T: Transport> NetworkBackend<T> {
    pub fn new(transport: T, actors_limit: usize) -> Self {
        Self {
            transport,
            actors_limit,
            sessions: HashMap::new(),
            actors_registry: BTreeMap::new(),
            input_events: VecDeque::new(),
            timeouts: TimeoutManager::new(),
            armed_timers: HashMap::new(),
            is_closed: false,
        }
    }

    /// Number of currently registered actors.
    pub fn actors_count(&self) -> usize {
        self.actors_registry.len()
    }

    /// `true` if an actor with given UID is registered.
    pub fn is_registered(&self, actor_uid: u64) -> bool {
        self.actors_registry.contains_key(&actor_uid)
    }

    /// `true` if the client with given token has a live connection.
    pub fn is_alive(&self, client_token: u64) -> Result<bool, NetworkError> {
        self.sessions
            .get(&client_token)
            .map(|session| session.alive)
            .ok_or(NetworkError::UnknownClientToken(client_token))
    }

    /// Disconnection outcome of a dead client.
    pub fn disconnection_reason(&self, client_token: u64) -> Result<&HandlingResult, NetworkError> {
        if self.is_alive(client_token)? {
            return Err(NetworkError::AliveClient(client_token));
        }

        Ok(&self.sessions[&client_token].disconnection_reason)
    }

    /// Creates the session of a newly connected client: alive, unregistered,
    /// empty outbound queue.
    pub fn add_client(&mut self, new_token: u64) -> Result<(), NetworkError> {
        if self.sessions.contains_key(&new_token) {
            return Err(NetworkError::UnavailableClientToken(new_token));
        }

        debug!(target: "rptl", "Client {} connected", new_token);
        self.sessions.insert(new_token, Session::alive_unregistered());

        Ok(())
    }

    /// Marks the session dead with given reason; a bound actor goes through
    /// the full pipeline-closing routine.
    pub fn kill_client(&mut self, client_token: u64, reason: HandlingResult) {
        let Some(session) = self.sessions.get(&client_token) else {
            trace!(target: "rptl", "Ignoring kill for unknown client {}", client_token);
            return;
        };
        if !session.alive {
            return;
        }

        match session.actor.as_ref().map(|actor| actor.uid) {
            Some(actor_uid) => self.close_pipeline(actor_uid, reason),
            None => {
                if let Some(session) = self.sessions.get_mut(&client_token) {
                    session.alive = false;
                    session.disconnection_reason = reason;
                }
            }
        }
    }

    /// Removes the session of a dead client.
    pub fn remove_client(&mut self, old_token: u64) -> Result<(), NetworkError> {
        match self.sessions.get(&old_token) {
            None => Err(NetworkError::UnknownClientToken(old_token)),
            Some(session) if session.alive => Err(NetworkError::AliveClient(old_token)),
            Some(_) => {
                self.sessions.remove(&old_token);
                debug!(target: "rptl", "Removed client {}", old_token);
                Ok(())
            }
        }
    }

    fn push_input_event(&mut self, input_event: InputEvent) {
        self.input_events.push_back(input_event);
    }

    /// Dispatches a received message depending on whether the session has a
    /// bound actor.
    fn handle_message(&mut self, client_token: u64, message: &str) -> Result<InputEvent, RptlError> {
        let registered_actor = self
            .sessions
            .get(&client_token)
            .and_then(|session| session.actor.as_ref().map(|actor| actor.uid));

        match registered_actor {
            None => self.handle_from_unregistered(client_token, message),
            Some(actor_uid) => self.handle_from_actor(actor_uid, message),
        }
    }

    fn handle_from_unregistered(
        &mut self,
        client_token: u64,
        message: &str,
    ) -> Result<InputEvent, RptlError> {
        let command = TextParser::new(message, 1)
            .map_err(|_| RptlError::BadClientMessage("Empty RPTL command".to_owned()))?;

        match command.word(0) {
            CHECKOUT_COMMAND => {
                if !command.unparsed().is_empty() {
                    return Err(RptlError::BadClientMessage(
                        "No arguments expected with command CHECKOUT".to_owned(),
                    ));
                }

                let availability = format!(
                    "{} {} {}",
                    AVAILABILITY_COMMAND,
                    self.actors_registry.len(),
                    self.actors_limit
                );
                self.private_message(client_token, availability);

                // No server state was modified, nothing to dispatch.
                Ok(InputEvent::None)
            }
            LOGIN_COMMAND => {
                let arguments = TextParser::new(command.unparsed(), 2)
                    .map_err(|err| RptlError::BadClientMessage(err.to_string()))?;
                if !arguments.unparsed().is_empty() {
                    return Err(RptlError::BadClientMessage(
                        "Too many arguments for command LOGIN".to_owned(),
                    ));
                }

                let new_actor_uid: u64 = arguments.word(0).parse().map_err(|_| {
                    RptlError::BadClientMessage(
                        "Actor UID must be an unsigned integer of 64 bits".to_owned(),
                    )
                })?;
                let new_actor_name = arguments.word(1).to_owned();

                if self.actors_registry.len() >= self.actors_limit {
                    return Err(RptlError::InternalError(format!(
                        "Limit of {} actors reached",
                        self.actors_limit
                    )));
                }
                if self.is_registered(new_actor_uid) {
                    return Err(RptlError::InternalError(format!(
                        "Actor UID {} is unavailable",
                        new_actor_uid
                    )));
                }
                if self.sessions.values().any(|session| {
                    session
                        .actor
                        .as_ref()
                        .map_or(false, |actor| actor.name == new_actor_name)
                }) {
                    return Err(RptlError::InternalError(format!(
                        "Actor name \"{}\" is unavailable",
                        new_actor_name
                    )));
                }

                self.bind_actor(client_token, new_actor_uid, new_actor_name.clone());

                // The new client gets the roster snapshot, everyone learns
                // about the new actor.
                let roster = self.registration_message();
                self.private_message(client_token, roster);
                self.broadcast_message(format!(
                    "{} {} {}",
                    LOGGED_IN_COMMAND, new_actor_uid, new_actor_name
                ));

                debug!(target: "rptl", "Actor {} \"{}\" logged in", new_actor_uid, new_actor_name);

                Ok(InputEvent::Joined {
                    uid: new_actor_uid,
                    name: new_actor_name,
                })
            }
            unknown => Err(RptlError::BadClientMessage(format!(
                "Unknown RPTL command for unregistered mode: {}",
                unknown
            ))),
        }
    }

    fn handle_from_actor(&mut self, actor_uid: u64, message: &str) -> Result<InputEvent, RptlError> {
        let command = TextParser::new(message, 1)
            .map_err(|_| RptlError::BadClientMessage("Empty RPTL command".to_owned()))?;

        match command.word(0) {
            SERVICE_COMMAND => Ok(InputEvent::ServiceRequest {
                uid: actor_uid,
                request: command.unparsed().to_owned(),
            }),
            LOGOUT_COMMAND => {
                if !command.unparsed().is_empty() {
                    return Err(RptlError::BadClientMessage(
                        "No arguments expected with command LOGOUT".to_owned(),
                    ));
                }

                let owner_token = self.actors_registry[&actor_uid];
                self.unbind_actor(actor_uid, HandlingResult::success());

                // The departing client learns it was logged out properly,
                // remaining actors learn about the departure.
                self.private_message(owner_token, INTERRUPT_COMMAND.to_owned());
                self.broadcast_message(format!("{} {}", LOGGED_OUT_COMMAND, actor_uid));

                debug!(target: "rptl", "Actor {} logged out", actor_uid);

                Ok(InputEvent::Left {
                    uid: actor_uid,
                    reason: HandlingResult::success(),
                })
            }
            unknown => Err(RptlError::BadClientMessage(format!(
                "Unknown RPTL command for registered mode: {}",
                unknown
            ))),
        }
    }

    fn bind_actor(&mut self, client_token: u64, actor_uid: u64, name: String) {
        let session = self
            .sessions
            .get_mut(&client_token)
            .expect("message source session exists");
        session.actor = Some(Actor {
            uid: actor_uid,
            name,
        });

        self.actors_registry.insert(actor_uid, client_token);
    }

    /// Removes the actor from the registry and marks the owning session
    /// dead with given reason.
    fn unbind_actor(&mut self, actor_uid: u64, reason: HandlingResult) {
        let Some(owner_token) = self.actors_registry.remove(&actor_uid) else {
            return;
        };

        if let Some(session) = self.sessions.get_mut(&owner_token) {
            session.actor = None;
            session.alive = false;
            session.disconnection_reason = reason;
        }
    }

    /// Authoritative disconnection routine for a registered actor.
    fn close_pipeline(&mut self, actor_uid: u64, reason: HandlingResult) {
        // The executor must observe the departure before the session goes.
        self.push_input_event(InputEvent::Left {
            uid: actor_uid,
            reason: reason.clone(),
        });

        let Some(owner_token) = self.actors_registry.get(&actor_uid).copied() else {
            warn!(target: "rptl", "Closing pipeline of unregistered actor {}", actor_uid);
            return;
        };

        self.unbind_actor(actor_uid, reason.clone());

        let mut interrupt = INTERRUPT_COMMAND.to_owned();
        if !reason.is_success() {
            interrupt.push(' ');
            interrupt.push_str(reason.error_message());
        }

        self.private_message(owner_token, interrupt);
        self.broadcast_message(format!("{} {}", LOGGED_OUT_COMMAND, actor_uid));

        debug!(target: "rptl", "Pipeline closed with actor {}", actor_uid);
    }

    /// Roster snapshot sent to a freshly registered client, actors listed in
    /// UID order.
    fn registration_message(&self) -> String {
        let mut message = REGISTRATION_COMMAND.to_owned();

        for (actor_uid, owner_token) in &self.actors_registry {
            if let Some(actor) = self
                .sessions
                .get(owner_token)
                .and_then(|session| session.actor.as_ref())
            {
                message.push_str(&format!(" {} {}", actor_uid, actor.name));
            }
        }

        message
    }

    /// Enqueues one shared buffer to one session.
    fn private_message(&mut self, client_token: u64, message: String) {
        let buffer: Arc<str> = Arc::from(message);

        if let Some(session) = self.sessions.get_mut(&client_token) {
            session.outbox.push_back(buffer);
        }
    }

    /// Enqueues one shared buffer to the session of each targeted actor.
    /// Actors which logged out in the meantime are skipped.
    fn target_message(&mut self, target_uids: &HashSet<u64>, message: String) {
        let buffer: Arc<str> = Arc::from(message);

        for actor_uid in target_uids {
            let Some(owner_token) = self.actors_registry.get(actor_uid) else {
                trace!(target: "rptl", "Dropping message for unregistered actor {}", actor_uid);
                continue;
            };

            if let Some(session) = self.sessions.get_mut(owner_token) {
                session.outbox.push_back(Arc::clone(&buffer));
            }
        }
    }

    /// Enqueues one shared buffer to every registered actor's session.
    fn broadcast_message(&mut self, message: String) {
        let buffer: Arc<str> = Arc::from(message);

        let owner_tokens: Vec<u64> = self.actors_registry.values().copied().collect();
        for owner_token in owner_tokens {
            if let Some(session) = self.sessions.get_mut(&owner_token) {
                session.outbox.push_back(Arc::clone(&buffer));
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), NetworkError> {
        match event {
            TransportEvent::Connected { token } => self.add_client(token)?,
            TransportEvent::Message { token, message } => {
                // A dead session never produces new input events.
                if !self.is_alive(token).unwrap_or(false) {
                    trace!(target: "rptl", "Dropping message from dead client {}", token);
                    return Ok(());
                }

                match self.handle_message(token, &message) {
                    Ok(input_event) => self.push_input_event(input_event),
                    Err(err) => {
                        warn!(target: "rptl", "Killing client {}: {}", token, err);
                        self.kill_client(token, HandlingResult::failure(err.to_string()));
                    }
                }
            }
            TransportEvent::Disconnected { token, error } => {
                let reason = match error {
                    None => HandlingResult::success(),
                    Some(message) => HandlingResult::failure(message),
                };
                self.kill_client(token, reason);
            }
            TransportEvent::Stop { signal } => self.push_input_event(InputEvent::Stop { signal }),
        }

        Ok(())
    }

    /// Transitions expired armed timers to Triggered and queues the matching
    /// input events. Timers cleared while armed are dropped silently.
    fn fire_expired_timers(&mut self) {
        let mut expired = Vec::new();
        self.timeouts.wake(LocalTime::now(), &mut expired);

        for token in expired {
            let Some(timer) = self.armed_timers.remove(&token) else {
                continue;
            };
            if !timer.borrow().is_pending() {
                trace!(target: "rptl", "Timer {} was cleared while armed", token);
                continue;
            }

            debug!(target: "rptl", "Timer {} countdown is over", token);
            timer.borrow_mut().trigger();
            self.push_input_event(InputEvent::TimerTriggered { token });
        }
    }
}

impl<T: Transport> ServerEndpoint for NetworkBackend<T> {
    fn closed(&self) -> bool {
        self.is_closed
    }

    fn close(&mut self) {
        self.is_closed = true;
    }

    fn wait_for_input(&mut self) -> eyre::Result<InputEvent> {
        while self.input_events.is_empty() {
            let timeout = self.timeouts.next(LocalTime::now());
            let batch = self.transport.wait(timeout)?;

            self.fire_expired_timers();
            for event in batch {
                self.handle_transport_event(event)?;
            }
        }

        Ok(self
            .input_events
            .pop_front()
            .expect("input events queue is not empty"))
    }

    fn reply_to(&mut self, actor: u64, sr_response: &str) -> eyre::Result<()> {
        let owner_token = *self
            .actors_registry
            .get(&actor)
            .ok_or(NetworkError::UnknownActorUid(actor))?;

        self.private_message(owner_token, format!("{} {}", SERVICE_COMMAND, sr_response));

        Ok(())
    }

    fn output_event(&mut self, event: ServiceEvent) -> eyre::Result<()> {
        let event = event.prefix_with(&format!("{} ", SERVICE_COMMAND));

        if event.target_everyone() {
            self.broadcast_message(event.command().to_owned());
        } else {
            self.target_message(event.targets(), event.command().to_owned());
        }

        Ok(())
    }

    fn close_pipeline_with(&mut self, actor: u64, reason: HandlingResult) -> eyre::Result<()> {
        self.close_pipeline(actor, reason);
        Ok(())
    }

    fn begin_countdown(&mut self, timer: SharedTimer) -> eyre::Result<()> {
        let (token, countdown_ms) = {
            let mut timer = timer.borrow_mut();
            (timer.token(), timer.begin_countdown())
        };

        trace!(target: "rptl", "Measuring {} ms countdown of timer {}", countdown_ms, token);
        self.timeouts.register(
            token,
            LocalTime::now() + LocalDuration::from_millis(countdown_ms as u128),
        );
        self.armed_timers.insert(token, timer);

        Ok(())
    }

    fn synchronize(&mut self) -> eyre::Result<()> {
        let client_tokens: Vec<u64> = self.sessions.keys().copied().collect();

        for client_token in client_tokens {
            while let Some(buffer) = self
                .sessions
                .get_mut(&client_token)
                .and_then(|session| session.outbox.pop_front())
            {
                if let Err(err) = self.transport.transmit(client_token, &buffer) {
                    warn!(target: "rptl", "Transmission to client {} failed: {}", client_token, err);
                    self.kill_client(client_token, HandlingResult::failure(err.to_string()));

                    // The connection is gone, its queue will never drain.
                    if let Some(session) = self.sessions.get_mut(&client_token) {
                        session.outbox.clear();
                    }
                    break;
                }
            }

            // Dead sessions are reaped once their outbound queue drained, so
            // the executor has observed the death and the client got its
            // last messages.
            let dead_and_drained = self
                .sessions
                .get(&client_token)
                .map_or(false, |session| !session.alive && session.outbox.is_empty());

            if dead_and_drained {
                self.transport.disconnect(client_token);
                self.remove_client(client_token)?;
            }
        }

        Ok(())
    }
}
