//! Service Event/Request protocol: a registry of named services handling
//! requests from actors and emitting events back to them.
//!
//! Wire formats:
//! - Service Request (SR): `REQUEST <RUID> <SERVICE_NAME> <data>`
//! - Service Request Response (SRR): `RESPONSE <RUID> OK` or
//!   `RESPONSE <RUID> KO <error message>`
//! - Service Event (SE): `EVENT <SERVICE_NAME> <data>`
//!
//! The RUID is a 64-bit identifier the client attaches to a request so it can
//! correlate the response; this layer carries it verbatim without
//! interpreting it.
use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace};

use crate::event::ServiceEvent;
use crate::parser::TextParser;
use crate::service::SharedService;
use crate::timer::SharedTimer;

/// First word of every service request.
pub const REQUEST_PREFIX: &str = "REQUEST";
/// First word of every polled service event.
pub const EVENT_PREFIX: &str = "EVENT";

/// Returned by a service handler when the request data itself is malformed.
///
/// Converted into [`SerError::InvalidRequestFormat`], so the offending client
/// gets disconnected like for any other protocol violation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct BadServiceRequest(pub String);

/// An error occurring while a service request goes through the protocol.
#[derive(Debug, Error)]
pub enum SerError {
    /// The request does not follow the SER request format.
    #[error("invalid service request: {0}")]
    InvalidRequestFormat(String),

    /// No service registered under the requested name.
    #[error("no service named \"{0}\" is running")]
    ServiceNotFound(String),

    /// Two services were registered under the same name.
    #[error("service name \"{0}\" is already registered")]
    NameAlreadyRegistered(&'static str),
}

impl From<BadServiceRequest> for SerError {
    fn from(error: BadServiceRequest) -> Self {
        Self::InvalidRequestFormat(error.0)
    }
}

/// Registry running a set of named services.
///
/// A request is an action an actor wants a service to perform: handled
/// successfully it yields an `OK` response, refused it yields a `KO` response
/// with the refusal reason. An event is an action a service performed on its
/// own which must be dispatched to the targeted actors.
pub struct SerProtocol {
    running_services: Vec<SharedService>,
}

impl std::fmt::Debug for SerProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerProtocol")
            .field("running_services", &self.running_services.len())
            .finish()
    }
}

impl SerProtocol {
    /// Registers given services, each under its `name()`.
    pub fn new(services: impl IntoIterator<Item = SharedService>) -> Result<Self, SerError> {
        let mut running_services: Vec<SharedService> = Vec::new();
        let mut names: HashSet<&'static str> = HashSet::new();

        for service in services {
            let name = service.borrow().name();
            if !names.insert(name) {
                return Err(SerError::NameAlreadyRegistered(name));
            }

            debug!(target: "ser", "Registered service {}", name);
            running_services.push(service);
        }

        Ok(Self { running_services })
    }

    /// `true` if a service with given name is running.
    pub fn is_registered(&self, name: &str) -> bool {
        self.running_services
            .iter()
            .any(|service| service.borrow().name() == name)
    }

    /// Parses and executes given service request for given actor, returning
    /// the RPTL-ready response string.
    pub fn handle_service_request(
        &mut self,
        actor: u64,
        service_request: &str,
    ) -> Result<String, SerError> {
        trace!(target: "ser", "Handling SR command from actor {}: {}", actor, service_request);

        let parsed_request = TextParser::new(service_request, 3).map_err(|err| {
            SerError::InvalidRequestFormat(format!(
                "prefix, RUID and service name are required: {}",
                err
            ))
        })?;

        if parsed_request.word(0) != REQUEST_PREFIX {
            return Err(SerError::InvalidRequestFormat(format!(
                "command prefix must be {}",
                REQUEST_PREFIX
            )));
        }

        // The RUID is carried verbatim into the response, never interpreted.
        let ruid = parsed_request.word(1);
        let service_name = parsed_request.word(2);

        let service = self
            .running_services
            .iter()
            .find(|service| service.borrow().name() == service_name)
            .ok_or_else(|| SerError::ServiceNotFound(service_name.to_owned()))?;

        trace!(target: "ser", "SR command parsed, handled by service: {}", service_name);

        let result = service
            .borrow_mut()
            .handle_request(actor, parsed_request.unparsed())?;

        Ok(if result.is_success() {
            format!("RESPONSE {} OK", ruid)
        } else {
            format!("RESPONSE {} KO {}", ruid, result.error_message())
        })
    }

    /// Polls the oldest event across every running service, prefixed with
    /// `EVENT <service_name> `, or `None` when all queues are empty.
    ///
    /// Events are drained in the exact order they were emitted, regardless of
    /// which service emitted them: the smallest pending event id goes first.
    pub fn poll_service_event(&mut self) -> Option<ServiceEvent> {
        let mut oldest_emitter: Option<(&SharedService, u64)> = None;

        for service in &self.running_services {
            if let Some(event_id) = service.borrow().check_event() {
                trace!(target: "ser", "Service {} next event id: {}", service.borrow().name(), event_id);

                if oldest_emitter.map_or(true, |(_, lowest_id)| event_id < lowest_id) {
                    oldest_emitter = Some((service, event_id));
                }
            }
        }

        oldest_emitter.map(|(service, _)| {
            let name = service.borrow().name();
            let event = service.borrow_mut().poll_event();
            trace!(target: "ser", "Polled event from service {}: {}", name, event.command());

            event.prefix_with(&format!("{} {} ", EVENT_PREFIX, name))
        })
    }

    /// Ready timers across every running service, for the backend to arm.
    pub fn waiting_timers(&self) -> Vec<SharedTimer> {
        self.running_services
            .iter()
            .flat_map(|service| service.borrow().waiting_timers())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use quickcheck::quickcheck;

    use crate::context::{ServiceContext, SharedContext};
    use crate::handling::HandlingResult;
    use crate::service::{Service, ServiceCore};

    /// Emits its own name as a broadcast event for every handled request;
    /// refuses requests carrying the data `refuse` and errors on `broken`.
    struct EchoService {
        name: &'static str,
        core: ServiceCore,
    }

    impl EchoService {
        fn new_shared(name: &'static str, context: &SharedContext) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self {
                name,
                core: ServiceCore::new(Rc::clone(context)),
            }))
        }
    }

    impl Service for EchoService {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle_request(
            &mut self,
            _actor: u64,
            sr_command_data: &str,
        ) -> Result<HandlingResult, BadServiceRequest> {
            match sr_command_data {
                "refuse" => Ok(HandlingResult::failure("Refused by service")),
                "broken" => Err(BadServiceRequest("Unknown action: broken".to_owned())),
                _ => {
                    self.core.emit(ServiceEvent::broadcast(self.name));
                    Ok(HandlingResult::success())
                }
            }
        }

        fn core(&self) -> &ServiceCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ServiceCore {
            &mut self.core
        }
    }

    fn protocol_with(names: &[&'static str]) -> (SerProtocol, Vec<Rc<RefCell<EchoService>>>) {
        let context = ServiceContext::new();
        let services: Vec<_> = names
            .iter()
            .copied()
            .map(|name| EchoService::new_shared(name, &context))
            .collect();
        let protocol = SerProtocol::new(
            services
                .iter()
                .map(|service| Rc::clone(service) as SharedService),
        )
        .unwrap();

        (protocol, services)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let context = ServiceContext::new();
        let first = EchoService::new_shared("Echo", &context);
        let second = EchoService::new_shared("Echo", &context);

        let error = SerProtocol::new([
            first as SharedService,
            second as SharedService,
        ])
        .unwrap_err();

        assert!(matches!(error, SerError::NameAlreadyRegistered("Echo")));
    }

    #[test]
    fn successful_request_yields_ok_response() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let response = protocol
            .handle_service_request(42, "REQUEST 1 Echo hello")
            .unwrap();

        assert_eq!(response, "RESPONSE 1 OK");
    }

    #[test]
    fn refused_request_yields_ko_response() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let response = protocol
            .handle_service_request(42, "REQUEST abcdef01 Echo refuse")
            .unwrap();

        assert_eq!(response, "RESPONSE abcdef01 KO Refused by service");
    }

    #[test]
    fn ruid_is_preserved_verbatim() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let response = protocol
            .handle_service_request(42, "REQUEST 0xDEADBEEF Echo hello")
            .unwrap();

        assert_eq!(response, "RESPONSE 0xDEADBEEF OK");
    }

    #[test]
    fn missing_words_are_invalid_format() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let error = protocol.handle_service_request(42, "REQUEST 1").unwrap_err();

        assert!(matches!(error, SerError::InvalidRequestFormat(_)));
    }

    #[test]
    fn wrong_prefix_is_invalid_format() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let error = protocol
            .handle_service_request(42, "QUERY 1 Echo hello")
            .unwrap_err();

        assert!(matches!(error, SerError::InvalidRequestFormat(_)));
    }

    #[test]
    fn unknown_service_is_reported() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let error = protocol
            .handle_service_request(42, "REQUEST 1 Chat hello")
            .unwrap_err();

        assert!(matches!(error, SerError::ServiceNotFound(name) if name == "Chat"));
    }

    #[test]
    fn service_parse_error_is_invalid_format() {
        let (mut protocol, _services) = protocol_with(&["Echo"]);

        let error = protocol
            .handle_service_request(42, "REQUEST 1 Echo broken")
            .unwrap_err();

        assert!(matches!(error, SerError::InvalidRequestFormat(_)));
    }

    #[test]
    fn events_drain_across_services_in_emission_order() {
        let (mut protocol, services) = protocol_with(&["A", "B"]);

        // A emits, then B, then A again: drain must interleave accordingly.
        services[0].borrow_mut().handle_request(1, "go").unwrap();
        services[1].borrow_mut().handle_request(1, "go").unwrap();
        services[0].borrow_mut().handle_request(1, "go").unwrap();

        let drained: Vec<String> = std::iter::from_fn(|| protocol.poll_service_event())
            .map(|event| event.command().to_owned())
            .collect();

        assert_eq!(drained, vec!["EVENT A A", "EVENT B B", "EVENT A A"]);
    }

    #[test]
    fn poll_returns_none_when_queues_are_empty() {
        let (mut protocol, _services) = protocol_with(&["A", "B"]);

        assert!(protocol.poll_service_event().is_none());
    }

    quickcheck! {
        /// Whatever the interleaving of emissions across services, repeated
        /// polling returns events in global emission order.
        fn drain_order_is_emission_order(choices: Vec<bool>) -> bool {
            let (mut protocol, services) = protocol_with(&["A", "B"]);

            let mut emitted = Vec::new();
            for into_first in choices {
                let service = if into_first { &services[0] } else { &services[1] };
                service.borrow_mut().handle_request(0, "go").unwrap();
                emitted.push(if into_first { "EVENT A A" } else { "EVENT B B" });
            }

            let drained: Vec<String> = std::iter::from_fn(|| protocol.poll_service_event())
                .map(|event| event.command().to_owned())
                .collect();

            drained == emitted
        }
    }
}
