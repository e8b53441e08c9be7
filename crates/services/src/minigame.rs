//! Controller service running a board minigame between two actors.
use std::rc::Rc;

use tracing::warn;

use parlor_core::{
    BadServiceRequest, HandlingResult, Service, ServiceCore, ServiceEvent, SharedContext,
    TextParser,
};

use crate::acores::Acores;
use crate::bermudes::Bermudes;
use crate::board::{BoardGame, Player};
use crate::canaries::Canaries;
use crate::grid::Coordinates;

/// Factory producing a fresh board game for each session.
pub type BoardGameProvider = Box<dyn Fn() -> Box<dyn BoardGame>>;

/// One of the shipped board minigames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Minigame {
    Acores,
    Bermudes,
    Canaries,
}

impl Minigame {
    /// Provider building boards of this minigame.
    pub fn provider(self) -> BoardGameProvider {
        match self {
            Minigame::Acores => Box::new(|| Box::new(Acores::new())),
            Minigame::Bermudes => Box::new(|| Box::new(Bermudes::new())),
            Minigame::Canaries => Box::new(|| Box::new(Canaries::new())),
        }
    }
}

/// Controls the execution flow of a board minigame played by two actors.
///
/// Requests are only accepted from the actor whose round it is:
/// `MOVE <from-line> <from-col> <to-line> <to-col>` plays a move, `END`
/// terminates the round. Grid changes, round switches, pawn counts, victory
/// and game termination are synced to every actor through events.
pub struct MinigameService {
    core: ServiceCore,
    provider: BoardGameProvider,
    current_game: Option<Box<dyn BoardGame>>,
    white_player_actor: u64,
    black_player_actor: u64,
    stopped_hook: Option<Box<dyn Fn()>>,
}

impl MinigameService {
    /// Service without a running game; assigned actor UIDs get meaning at
    /// [`start`](Self::start).
    pub fn new(run_context: &SharedContext, provider: BoardGameProvider) -> Self {
        Self {
            core: ServiceCore::new(Rc::clone(run_context)),
            provider,
            current_game: None,
            white_player_actor: 0,
            black_player_actor: 0,
            stopped_hook: None,
        }
    }

    /// Registers the routine run every time the game stops, whatever the
    /// cause; the lobby plugs its waiting notification here.
    pub fn set_stopped_hook(&mut self, hook: impl Fn() + 'static) {
        self.stopped_hook = Some(Box::new(hook));
    }

    /// `true` while a game session is running.
    pub fn is_started(&self) -> bool {
        self.current_game.is_some()
    }

    /// `true` if given actor plays in the current session.
    pub fn is_player(&self, actor_uid: u64) -> bool {
        self.is_started()
            && (actor_uid == self.white_player_actor || actor_uid == self.black_player_actor)
    }

    /// Starts a game session with given actors, syncing clients with the
    /// player assignments and the opening round.
    pub fn start(&mut self, white_player_actor: u64, black_player_actor: u64) {
        if self.current_game.is_some() {
            warn!(target: "minigame", "Game is already running, start ignored");
            return;
        }

        self.white_player_actor = white_player_actor;
        self.black_player_actor = black_player_actor;
        self.current_game = Some((self.provider)());

        self.core.emit(ServiceEvent::broadcast(format!(
            "START {} {}",
            white_player_actor, black_player_actor
        )));
        // Every minigame starts with the white player.
        self.core.emit(ServiceEvent::broadcast("ROUND_FOR WHITE"));
    }

    /// Stops the running game, syncing clients and notifying the stopped
    /// hook.
    pub fn stop(&mut self) {
        if self.current_game.take().is_none() {
            warn!(target: "minigame", "Game is not running, stop ignored");
            return;
        }

        self.core.emit(ServiceEvent::broadcast("STOP"));

        if let Some(hook) = &self.stopped_hook {
            hook();
        }
    }

    /// Goes to the next round, syncing clients with the new round player.
    fn terminate_round(&mut self) -> HandlingResult {
        let next_player = match self
            .current_game
            .as_mut()
            .expect("a game is running")
            .next_round()
        {
            Ok(player) => player,
            Err(err) => return HandlingResult::failure(err.to_string()),
        };

        self.core
            .emit(ServiceEvent::broadcast(format!("ROUND_FOR {}", next_player)));

        HandlingResult::success()
    }

    fn handle_move(&mut self, move_args: &str) -> Result<HandlingResult, BadServiceRequest> {
        let parsed_move = TextParser::new(move_args, 4)
            .map_err(|err| BadServiceRequest(format!("Unable to parse MOVE arguments: {}", err)))?;

        let mut coordinates = [0i32; 4];
        for (argument, coordinate) in coordinates.iter_mut().enumerate() {
            *coordinate = parsed_move.word(argument).parse().map_err(|err| {
                BadServiceRequest(format!("Unable to parse MOVE arg #{}: {}", argument, err))
            })?;
        }
        let from = Coordinates {
            line: coordinates[0],
            column: coordinates[1],
        };
        let to = Coordinates {
            line: coordinates[2],
            column: coordinates[3],
        };

        let (updates, pawn_counts, winner, round_over) = {
            let game = self.current_game.as_mut().expect("a game is running");

            if game.is_round_terminated() {
                return Ok(HandlingResult::failure(
                    "Cannot make any move, round terminated",
                ));
            }

            let updates = match game.play(from, to) {
                Ok(updates) => updates,
                Err(err) => return Ok(HandlingResult::failure(err.to_string())),
            };

            (
                updates,
                (game.pawns_for(Player::White), game.pawns_for(Player::Black)),
                game.victory_for(),
                game.is_round_terminated(),
            )
        };

        for (square, updated_state) in &updates.updated_squares {
            self.core.emit(ServiceEvent::broadcast(format!(
                "SQUARE_UPDATE {} {} {}",
                square.line, square.column, updated_state
            )));
        }

        self.core.emit(ServiceEvent::broadcast(format!(
            "MOVED {} {} {} {}",
            updates.move_origin.line,
            updates.move_origin.column,
            updates.move_destination.line,
            updates.move_destination.column
        )));

        // Clients don't need to recalculate the counts themselves.
        self.core.emit(ServiceEvent::broadcast(format!(
            "PAWN_COUNTS {} {}",
            pawn_counts.0, pawn_counts.1
        )));

        if let Some(winner) = winner {
            self.core
                .emit(ServiceEvent::broadcast(format!("VICTORY_FOR {}", winner)));
            self.stop();
        } else if round_over {
            // The move used up the round; switching now cannot fail.
            let switched = self.terminate_round();
            debug_assert!(switched.is_success());
        }

        Ok(HandlingResult::success())
    }
}

impl Service for MinigameService {
    fn name(&self) -> &'static str {
        "Minigame"
    }

    fn handle_request(
        &mut self,
        actor: u64,
        sr_command_data: &str,
    ) -> Result<HandlingResult, BadServiceRequest> {
        if self.current_game.is_none() {
            return Ok(HandlingResult::failure("Game is stopped"));
        }

        let expected_actor = match self
            .current_game
            .as_ref()
            .expect("a game is running")
            .current_round()
        {
            Player::White => self.white_player_actor,
            Player::Black => self.black_player_actor,
        };
        if actor != expected_actor {
            return Ok(HandlingResult::failure("This is not your turn"));
        }

        let parsed_action = TextParser::new(sr_command_data, 1)
            .map_err(|err| BadServiceRequest(err.to_string()))?;

        match parsed_action.word(0) {
            "MOVE" => self.handle_move(parsed_action.unparsed()),
            "END" => Ok(self.terminate_round()),
            unknown => Err(BadServiceRequest(format!("Unknown action: {}", unknown))),
        }
    }

    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }
}
