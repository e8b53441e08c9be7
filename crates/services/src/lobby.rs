//! Lobby waiting for two ready actors before starting the minigame.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use thiserror::Error;

use parlor_core::{
    BadServiceRequest, HandlingResult, Service, ServiceCore, ServiceEvent, SharedContext,
    SharedTimer, TextParser, Timer,
};

use crate::board::Player;
use crate::minigame::MinigameService;

/// An actor-to-player assignment operation failed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BadPlayersState(pub String);

/// An assigned actor and its current readiness.
#[derive(Debug)]
struct Entrant {
    actor_uid: u64,
    is_ready: bool,
}

/// Waits for the two assigned actors to be ready, then counts down and
/// starts the minigame.
///
/// There are two entrant slots, one per player color. Each logged-in actor
/// is assigned a slot by the application when it joins. SR `READY` toggles
/// the sender's readiness; as soon as both entrants are ready the starting
/// countdown runs, and at its timeout the game begins. Any entrant becoming
/// un-ready, or leaving, cancels the countdown.
///
/// Events: `READY_PLAYER <uid>`, `WAITING_FOR_PLAYER <uid>`,
/// `BEGIN_COUNTDOWN <ms>`, `END_COUNTDOWN`, `PLAYING`, `WAITING`.
pub struct LobbyService {
    core: ServiceCore,
    minigame_session: Rc<RefCell<MinigameService>>,
    white_player_actor: Option<Entrant>,
    black_player_actor: Option<Entrant>,
    ready_players: u32,
    starting_countdown: SharedTimer,
    self_handle: Weak<RefCell<LobbyService>>,
}

impl LobbyService {
    /// Lobby starting given minigame session `countdown_ms` after both
    /// entrants are ready.
    ///
    /// The lobby is built shared because the countdown callback and the
    /// minigame stopped hook both reach back into it.
    pub fn new_shared(
        run_context: &SharedContext,
        minigame_session: Rc<RefCell<MinigameService>>,
        countdown_ms: u64,
    ) -> Rc<RefCell<Self>> {
        let starting_countdown = Timer::new(run_context, countdown_ms);
        let mut core = ServiceCore::new(Rc::clone(run_context));
        core.watch_timer(Rc::clone(&starting_countdown));

        let lobby = Rc::new_cyclic(|self_handle: &Weak<RefCell<Self>>| {
            RefCell::new(Self {
                core,
                minigame_session: Rc::clone(&minigame_session),
                white_player_actor: None,
                black_player_actor: None,
                ready_players: 0,
                starting_countdown,
                self_handle: self_handle.clone(),
            })
        });

        // The lobby waits again as soon as the running game stops.
        let waiting_lobby = Rc::downgrade(&lobby);
        minigame_session.borrow_mut().set_stopped_hook(move || {
            if let Some(lobby) = waiting_lobby.upgrade() {
                lobby.borrow_mut().notify_waiting();
            }
        });

        lobby
    }

    /// Assigns given actor to an available player slot.
    pub fn assign_actor(&mut self, actor_uid: u64) -> Result<Player, BadPlayersState> {
        if self.white_player_actor.is_none() {
            self.white_player_actor = Some(Entrant {
                actor_uid,
                is_ready: false,
            });
            Ok(Player::White)
        } else if self.black_player_actor.is_none() {
            self.black_player_actor = Some(Entrant {
                actor_uid,
                is_ready: false,
            });
            Ok(Player::Black)
        } else {
            Err(BadPlayersState("No player available".to_owned()))
        }
    }

    /// Removes given actor from its player slot, cancelling the countdown
    /// if it was ready.
    pub fn remove_actor(&mut self, actor_uid: u64) -> Result<(), BadPlayersState> {
        let assigned_white = self
            .white_player_actor
            .as_ref()
            .map_or(false, |entrant| entrant.actor_uid == actor_uid);
        let assigned_black = self
            .black_player_actor
            .as_ref()
            .map_or(false, |entrant| entrant.actor_uid == actor_uid);

        if !assigned_white && !assigned_black {
            return Err(BadPlayersState(format!(
                "Actor {} isn't assigned to any player",
                actor_uid
            )));
        }

        let slot = if assigned_white {
            &mut self.white_player_actor
        } else {
            &mut self.black_player_actor
        };
        let was_ready = slot.as_ref().map_or(false, |entrant| entrant.is_ready);
        *slot = None;

        if was_ready {
            self.ready_players -= 1;
            self.cancel_countdown();
        }

        Ok(())
    }

    /// Resets every entrant readiness and syncs clients with the lobby
    /// waiting for players again.
    pub fn notify_waiting(&mut self) {
        for slot in [&mut self.white_player_actor, &mut self.black_player_actor] {
            if let Some(entrant) = slot {
                entrant.is_ready = false;
            }
        }
        self.ready_players = 0;

        self.core.emit(ServiceEvent::broadcast("WAITING"));
    }

    /// Stops the starting countdown, syncing clients if one was announced.
    fn cancel_countdown(&mut self) {
        let announced = {
            let countdown = self.starting_countdown.borrow();
            countdown.is_waiting_countdown() || countdown.is_pending()
        };
        if announced {
            self.core.emit(ServiceEvent::broadcast("END_COUNTDOWN"));
        }

        self.starting_countdown.borrow_mut().clear();
    }

    fn entrant_for(&mut self, actor_uid: u64) -> Option<&mut Entrant> {
        [&mut self.white_player_actor, &mut self.black_player_actor]
            .into_iter()
            .flatten()
            .find(|entrant| entrant.actor_uid == actor_uid)
    }
}

impl Service for LobbyService {
    fn name(&self) -> &'static str {
        "Lobby"
    }

    fn handle_request(
        &mut self,
        actor: u64,
        sr_command_data: &str,
    ) -> Result<HandlingResult, BadServiceRequest> {
        let parsed_command = TextParser::new(sr_command_data, 1)
            .map_err(|err| BadServiceRequest(err.to_string()))?;
        if parsed_command.word(0) != "READY" {
            return Err(BadServiceRequest(
                "Only READY command is available for Lobby".to_owned(),
            ));
        }

        let Some(entrant) = self.entrant_for(actor) else {
            return Ok(HandlingResult::failure(format!(
                "Actor {} isn't assigned to any player",
                actor
            )));
        };

        entrant.is_ready = !entrant.is_ready;
        let now_ready = entrant.is_ready;

        if now_ready {
            self.ready_players += 1;
            self.core
                .emit(ServiceEvent::broadcast(format!("READY_PLAYER {}", actor)));
        } else {
            self.ready_players -= 1;
            self.core.emit(ServiceEvent::broadcast(format!(
                "WAITING_FOR_PLAYER {}",
                actor
            )));
        }

        if self.ready_players == 2 {
            self.starting_countdown.borrow_mut().request_countdown();

            let playing_lobby = self.self_handle.clone();
            let minigame = Rc::clone(&self.minigame_session);
            let white_actor = self
                .white_player_actor
                .as_ref()
                .expect("both players are assigned when both are ready")
                .actor_uid;
            let black_actor = self
                .black_player_actor
                .as_ref()
                .expect("both players are assigned when both are ready")
                .actor_uid;

            // At the countdown timeout, clients learn the game begins and
            // the session starts with the assigned actors.
            self.starting_countdown
                .borrow_mut()
                .on_next_trigger(move || {
                    if let Some(lobby) = playing_lobby.upgrade() {
                        lobby
                            .borrow_mut()
                            .core
                            .emit(ServiceEvent::broadcast("PLAYING"));
                    }
                    minigame.borrow_mut().start(white_actor, black_actor);
                });

            self.core.emit(ServiceEvent::broadcast(format!(
                "BEGIN_COUNTDOWN {}",
                self.starting_countdown.borrow().countdown()
            )));
        } else {
            self.cancel_countdown();
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

#[cfg(test)]
mod tests {
    use super::*;

    use parlor_core::ServiceContext;

    use crate::minigame::Minigame;

    const COUNTDOWN_MS: u64 = 500;
    const WHITE_ACTOR: u64 = 0;
    const BLACK_ACTOR: u64 = 1;

    struct Fixture {
        lobby: Rc<RefCell<LobbyService>>,
        minigame: Rc<RefCell<MinigameService>>,
    }

    fn fixture() -> Fixture {
        let context = ServiceContext::new();
        let minigame = Rc::new(RefCell::new(MinigameService::new(
            &context,
            Minigame::Acores.provider(),
        )));
        let lobby = LobbyService::new_shared(&context, Rc::clone(&minigame), COUNTDOWN_MS);

        lobby.borrow_mut().assign_actor(WHITE_ACTOR).unwrap();
        lobby.borrow_mut().assign_actor(BLACK_ACTOR).unwrap();

        Fixture { lobby, minigame }
    }

    fn drain(service: &mut dyn Service) -> Vec<String> {
        std::iter::from_fn(|| service.core_mut().take_event())
            .map(|event| event.command().to_owned())
            .collect()
    }

    #[test]
    fn actors_fill_white_then_black_slots() {
        let context = ServiceContext::new();
        let minigame = Rc::new(RefCell::new(MinigameService::new(
            &context,
            Minigame::Acores.provider(),
        )));
        let lobby = LobbyService::new_shared(&context, minigame, COUNTDOWN_MS);
        let mut lobby = lobby.borrow_mut();

        assert!(matches!(lobby.assign_actor(0), Ok(Player::White)));
        assert!(matches!(lobby.assign_actor(1), Ok(Player::Black)));
        assert!(lobby.assign_actor(2).is_err());
    }

    #[test]
    fn ready_toggles_and_syncs_clients() {
        let fixture = fixture();
        let mut lobby = fixture.lobby.borrow_mut();

        lobby.handle_request(WHITE_ACTOR, "READY").unwrap();
        assert_eq!(drain(&mut *lobby), vec!["READY_PLAYER 0"]);

        lobby.handle_request(WHITE_ACTOR, "READY").unwrap();
        assert_eq!(drain(&mut *lobby), vec!["WAITING_FOR_PLAYER 0"]);
    }

    #[test]
    fn both_ready_begins_the_countdown() {
        let fixture = fixture();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();

        assert_eq!(
            drain(&mut *fixture.lobby.borrow_mut()),
            vec!["READY_PLAYER 0", "READY_PLAYER 1", "BEGIN_COUNTDOWN 500"]
        );
        assert_eq!(fixture.lobby.borrow().waiting_timers().len(), 1);
    }

    #[test]
    fn unready_player_cancels_the_countdown() {
        let fixture = fixture();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();

        // The backend armed the countdown in the meantime.
        let countdown = Rc::clone(&fixture.lobby.borrow().starting_countdown);
        countdown.borrow_mut().begin_countdown();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();

        assert_eq!(
            drain(&mut *fixture.lobby.borrow_mut()),
            vec![
                "READY_PLAYER 0",
                "READY_PLAYER 1",
                "BEGIN_COUNTDOWN 500",
                "WAITING_FOR_PLAYER 1",
                "END_COUNTDOWN",
            ]
        );
        assert!(countdown.borrow().is_free());
        // The discarded trigger callback must not start the game later.
        assert!(!fixture.minigame.borrow().is_started());
    }

    #[test]
    fn countdown_timeout_starts_the_game() {
        let fixture = fixture();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();
        drain(&mut *fixture.lobby.borrow_mut());

        let countdown = Rc::clone(&fixture.lobby.borrow().starting_countdown);
        countdown.borrow_mut().begin_countdown();
        countdown.borrow_mut().trigger();

        assert!(fixture.minigame.borrow().is_started());
        assert_eq!(drain(&mut *fixture.lobby.borrow_mut()), vec!["PLAYING"]);
        assert_eq!(
            drain(&mut *fixture.minigame.borrow_mut()),
            vec!["START 0 1", "ROUND_FOR WHITE"]
        );
    }

    #[test]
    fn leaving_ready_player_cancels_the_countdown() {
        let fixture = fixture();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();

        fixture.lobby.borrow_mut().remove_actor(BLACK_ACTOR).unwrap();

        let events = drain(&mut *fixture.lobby.borrow_mut());
        assert_eq!(events.last().unwrap(), "END_COUNTDOWN");
        // The freed slot is available again.
        assert!(matches!(
            fixture.lobby.borrow_mut().assign_actor(7),
            Ok(Player::Black)
        ));
    }

    #[test]
    fn stopped_game_puts_the_lobby_back_to_waiting() {
        let fixture = fixture();

        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        fixture
            .lobby
            .borrow_mut()
            .handle_request(BLACK_ACTOR, "READY")
            .unwrap();
        drain(&mut *fixture.lobby.borrow_mut());

        let countdown = Rc::clone(&fixture.lobby.borrow().starting_countdown);
        countdown.borrow_mut().begin_countdown();
        countdown.borrow_mut().trigger();
        drain(&mut *fixture.lobby.borrow_mut());
        drain(&mut *fixture.minigame.borrow_mut());

        fixture.minigame.borrow_mut().stop();

        assert_eq!(drain(&mut *fixture.lobby.borrow_mut()), vec!["WAITING"]);
        // Entrants must ready up again for the next game.
        fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "READY")
            .unwrap();
        assert_eq!(
            drain(&mut *fixture.lobby.borrow_mut()),
            vec!["READY_PLAYER 0"]
        );
    }

    #[test]
    fn unassigned_actor_ready_is_refused() {
        let fixture = fixture();

        let result = fixture
            .lobby
            .borrow_mut()
            .handle_request(42, "READY")
            .unwrap();

        assert!(!result.is_success());
    }

    #[test]
    fn non_ready_commands_are_bad_requests() {
        let fixture = fixture();

        assert!(fixture
            .lobby
            .borrow_mut()
            .handle_request(WHITE_ACTOR, "START")
            .is_err());
        assert!(fixture.lobby.borrow_mut().handle_request(WHITE_ACTOR, "").is_err());
    }
}
