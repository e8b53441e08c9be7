//! End-to-end scenarios driving the full stack: scripted transport, RPTL
//! backend, SER protocol, reference services and the executor.
use std::cell::RefCell;
use std::rc::Rc;

use parlor_core::{
    BadServiceRequest, Executor, HandlingResult, SerProtocol, Service, ServiceContext,
    ServiceCore, ServiceEvent, SharedContext, SharedService,
};
use parlor_network::testing::{ScriptHandle, ScriptedTransport};
use parlor_network::{NetworkBackend, TransportEvent};
use parlor_services::{ChatService, LobbyService, Minigame, MinigameService};

const CHAT_COOLDOWN_MS: u64 = 2000;

struct Server {
    executor: Executor<NetworkBackend<ScriptedTransport>>,
    script: ScriptHandle,
    minigame: Rc<RefCell<MinigameService>>,
    departures: Rc<RefCell<Vec<(u64, bool)>>>,
}

/// Full server wired the way the application wires it, on a scripted
/// transport.
fn server(lobby_countdown_ms: u64, actors_limit: usize) -> Server {
    let context = ServiceContext::new();

    let chat = Rc::new(RefCell::new(ChatService::new(&context, CHAT_COOLDOWN_MS)));
    let minigame = Rc::new(RefCell::new(MinigameService::new(
        &context,
        Minigame::Acores.provider(),
    )));
    let lobby = LobbyService::new_shared(&context, Rc::clone(&minigame), lobby_countdown_ms);

    let ser_protocol = SerProtocol::new([
        Rc::clone(&chat) as SharedService,
        Rc::clone(&minigame) as SharedService,
        Rc::clone(&lobby) as SharedService,
    ])
    .unwrap();

    let (transport, script) = ScriptedTransport::new();
    let backend = NetworkBackend::new(transport, actors_limit);

    let departures = Rc::new(RefCell::new(Vec::new()));

    let joined_lobby = Rc::clone(&lobby);
    let left_lobby = Rc::clone(&lobby);
    let left_minigame = Rc::clone(&minigame);
    let departure_log = Rc::clone(&departures);

    let executor = Executor::new(backend, ser_protocol)
        .on_joined(move |uid, _name| {
            joined_lobby.borrow_mut().assign_actor(uid).ok();
        })
        .on_left(move |uid, reason| {
            departure_log.borrow_mut().push((uid, reason.is_success()));

            let was_playing = left_minigame.borrow().is_player(uid);
            if was_playing {
                left_minigame.borrow_mut().stop();
            }
            left_lobby.borrow_mut().remove_actor(uid).ok();
        });

    Server {
        executor,
        script,
        minigame,
        departures,
    }
}

fn connect(token: u64) -> Vec<TransportEvent> {
    vec![TransportEvent::Connected { token }]
}

fn message(token: u64, line: &str) -> Vec<TransportEvent> {
    vec![TransportEvent::Message {
        token,
        message: line.to_owned(),
    }]
}

fn stop() -> Vec<TransportEvent> {
    vec![TransportEvent::Stop { signal: 15 }]
}

/// Lines delivered to `token` carrying events of `service`.
fn service_events(script: &ScriptHandle, token: u64, service: &str) -> Vec<String> {
    let prefix = format!("SERVICE EVENT {} ", service);
    script
        .lines_for(token)
        .into_iter()
        .filter(|line| line.starts_with(&prefix))
        .collect()
}

#[test]
fn login_and_chat() {
    let mut server = server(500, 2);

    server.script.push_batch(connect(1));
    server.script.push_batch(message(1, "LOGIN 42 Alice"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 1 Chat Hello world"));
    server.script.push_batch(stop());

    assert!(server.executor.run());

    assert_eq!(
        server.script.lines_for(1),
        vec![
            "REGISTRATION 42 Alice",
            "LOGGED_IN 42 Alice",
            "SERVICE RESPONSE 1 OK",
            "SERVICE EVENT Chat MESSAGE_FROM 42 Hello world",
        ]
    );
}

#[test]
fn chat_cooldown_rejects_second_message() {
    let mut server = server(500, 2);

    server.script.push_batch(connect(1));
    server.script.push_batch(message(1, "LOGIN 42 Alice"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 1 Chat Hello world"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 2 Chat Another"));
    server.script.push_batch(stop());

    assert!(server.executor.run());

    let lines = server.script.lines_for(1);
    assert!(lines.contains(
        &"SERVICE RESPONSE 2 KO Last message when sent less than 2000 ms ago".to_owned()
    ));
    // The refused message produced no event.
    assert_eq!(service_events(&server.script, 1, "Chat").len(), 1);
}

#[test]
fn lobby_countdown_is_cancelled_by_unready_player() {
    let mut server = server(500, 2);

    server.script.push_batch(connect(1));
    server.script.push_batch(message(1, "LOGIN 0 Zero"));
    server.script.push_batch(connect(2));
    server.script.push_batch(message(2, "LOGIN 1 One"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 1 Lobby READY"));
    server
        .script
        .push_batch(message(2, "SERVICE REQUEST 2 Lobby READY"));
    // Both clients un-arm the countdown before its 500 ms elapse.
    server
        .script
        .push_batch(message(2, "SERVICE REQUEST 3 Lobby READY"));
    server.script.push_batch(stop());

    assert!(server.executor.run());

    assert_eq!(
        service_events(&server.script, 1, "Lobby"),
        vec![
            "SERVICE EVENT Lobby READY_PLAYER 0",
            "SERVICE EVENT Lobby READY_PLAYER 1",
            "SERVICE EVENT Lobby BEGIN_COUNTDOWN 500",
            "SERVICE EVENT Lobby WAITING_FOR_PLAYER 1",
            "SERVICE EVENT Lobby END_COUNTDOWN",
        ]
    );
    assert!(!server.minigame.borrow().is_started());
}

#[test]
fn minigame_move_ends_the_round() {
    // A zero countdown starts the game at the next executor iteration.
    let mut server = server(0, 2);

    server.script.push_batch(connect(1));
    server.script.push_batch(message(1, "LOGIN 0 Zero"));
    server.script.push_batch(connect(2));
    server.script.push_batch(message(2, "LOGIN 1 One"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 1 Lobby READY"));
    server
        .script
        .push_batch(message(2, "SERVICE REQUEST 2 Lobby READY"));
    server
        .script
        .push_batch(message(1, "SERVICE REQUEST 7 Minigame MOVE 3 2 3 3"));
    server.script.push_batch(stop());

    assert!(server.executor.run());

    // The countdown trigger announces the game, then starts it: the lobby
    // event comes first, in emission order across services.
    assert_eq!(
        service_events(&server.script, 2, "Lobby").last().unwrap(),
        "SERVICE EVENT Lobby PLAYING"
    );
    assert_eq!(
        service_events(&server.script, 2, "Minigame"),
        vec![
            "SERVICE EVENT Minigame START 0 1",
            "SERVICE EVENT Minigame ROUND_FOR WHITE",
            "SERVICE EVENT Minigame SQUARE_UPDATE 3 2 FREE",
            "SERVICE EVENT Minigame SQUARE_UPDATE 3 3 WHITE",
            "SERVICE EVENT Minigame MOVED 3 2 3 3",
            "SERVICE EVENT Minigame PAWN_COUNTS 12 12",
            "SERVICE EVENT Minigame ROUND_FOR BLACK",
        ]
    );
    assert!(server
        .script
        .lines_for(1)
        .contains(&"SERVICE RESPONSE 7 OK".to_owned()));
}

#[test]
fn logout_cleans_the_session_up() {
    let mut server = server(500, 2);

    server.script.push_batch(connect(1));
    server.script.push_batch(message(1, "LOGIN 42 Alice"));
    server.script.push_batch(connect(2));
    server.script.push_batch(message(2, "LOGIN 7 Bob"));
    server.script.push_batch(message(1, "LOGOUT"));
    // Service messages after the logout never reach the gone actor.
    server
        .script
        .push_batch(message(2, "SERVICE REQUEST 9 Chat hi"));
    server.script.push_batch(stop());

    assert!(server.executor.run());

    let alice_lines = server.script.lines_for(1);
    assert_eq!(alice_lines.last().unwrap(), "INTERRUPT");
    assert!(!alice_lines.contains(&"LOGGED_OUT 42".to_owned()));
    assert!(!alice_lines.contains(&"SERVICE EVENT Chat MESSAGE_FROM 7 hi".to_owned()));

    let bob_lines = server.script.lines_for(2);
    assert!(bob_lines.contains(&"LOGGED_OUT 42".to_owned()));
    assert!(bob_lines.contains(&"SERVICE EVENT Chat MESSAGE_FROM 7 hi".to_owned()));

    // The executor observed exactly one clean departure, and the dead
    // session was dropped once drained.
    assert_eq!(*server.departures.borrow(), vec![(42, true)]);
    assert_eq!(server.script.disconnected(), vec![1]);
}

/// Emits one event into itself, then one into its peer service, within the
/// same request handler.
struct ChainedEmitter {
    name: &'static str,
    core: ServiceCore,
    peer: Option<Rc<RefCell<ChainedEmitter>>>,
}

impl ChainedEmitter {
    fn new_shared(name: &'static str, context: &SharedContext) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            name,
            core: ServiceCore::new(Rc::clone(context)),
            peer: None,
        }))
    }
}

impl Service for ChainedEmitter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle_request(
        &mut self,
        _actor: u64,
        _sr_command_data: &str,
    ) -> Result<HandlingResult, BadServiceRequest> {
        self.core.emit(ServiceEvent::broadcast("FIRST"));
        if let Some(peer) = &self.peer {
            peer.borrow_mut()
                .core_mut()
                .emit(ServiceEvent::broadcast("SECOND"));
        }

        Ok(HandlingResult::success())
    }

    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }
}

#[test]
fn events_across_services_drain_in_emission_order() {
    let context = ServiceContext::new();
    let service_a = ChainedEmitter::new_shared("A", &context);
    let service_b = ChainedEmitter::new_shared("B", &context);
    service_a.borrow_mut().peer = Some(Rc::clone(&service_b));

    let mut ser_protocol = SerProtocol::new([
        Rc::clone(&service_a) as SharedService,
        Rc::clone(&service_b) as SharedService,
    ])
    .unwrap();

    let response = ser_protocol
        .handle_service_request(0, "REQUEST 1 A go")
        .unwrap();
    assert_eq!(response, "RESPONSE 1 OK");

    let drained: Vec<String> = std::iter::from_fn(|| ser_protocol.poll_service_event())
        .map(|event| event.command().to_owned())
        .collect();
    assert_eq!(drained, vec!["EVENT A FIRST", "EVENT B SECOND"]);
}
