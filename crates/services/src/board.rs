//! Round-by-round two-player board game substrate.
use std::fmt;

use thiserror::Error;

use crate::grid::{Coordinates, Grid, Square};

/// A player of a board game, owning the squares of its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Player {
    White,
    Black,
}

impl Player {
    /// Square state for a pawn of this player.
    pub fn color(self) -> Square {
        match self {
            Player::White => Square::White,
            Player::Black => Square::Black,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::White => Player::Black,
            Player::Black => Player::White,
        }
    }
}

impl fmt::Display for Player {
    /// Wire form of the player, as carried by `ROUND_FOR` and `VICTORY_FOR`
    /// events.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Player::White => "WHITE",
            Player::Black => "BLACK",
        };

        write!(f, "{}", word)
    }
}

/// A move was rejected by the game rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// A player tried to end its round without playing any move.
    #[error("Player can't skip a round")]
    MoveRequired,

    /// A square is not in the state the move requires.
    #[error("{0}")]
    BadSquareState(String),

    /// Coordinates outside the grid or not forming a playable move.
    #[error("{0}")]
    BadCoordinates(String),
}

/// Every square change a move applied to the grid, in application order,
/// plus the move endpoints.
#[derive(Debug, PartialEq, Eq)]
pub struct GridUpdate {
    pub updated_squares: Vec<(Coordinates, Square)>,
    pub move_origin: Coordinates,
    pub move_destination: Coordinates,
}

impl GridUpdate {
    /// Update for a move from `from` to `to`, no square changed yet.
    pub fn new(from: Coordinates, to: Coordinates) -> Self {
        Self {
            updated_squares: Vec::new(),
            move_origin: from,
            move_destination: to,
        }
    }
}

/// State shared by every board game: the grid, round bookkeeping and pawn
/// counters.
pub struct GameCore {
    grid: Grid,
    current_player: Player,
    has_moved: bool,
    white_pawns: u32,
    black_pawns: u32,
    /// A player whose pawn count drops below this threshold loses.
    loss_threshold: u32,
}

impl GameCore {
    /// New game on given grid, white player starting.
    ///
    /// # Panics
    ///
    /// Panics on a zero loss threshold, which could never be reached.
    pub fn new(grid: Grid, white_pawns: u32, black_pawns: u32, loss_threshold: u32) -> Self {
        assert!(
            loss_threshold > 0,
            "pawns count loss threshold must be strictly positive"
        );

        Self {
            grid,
            current_player: Player::White,
            has_moved: false,
            white_pawns,
            black_pawns,
            loss_threshold,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Records that the current player played a move this round.
    pub fn record_move(&mut self) {
        self.has_moved = true;
    }

    pub fn has_moved(&self) -> bool {
        self.has_moved
    }

    pub fn current_round(&self) -> Player {
        self.current_player
    }

    /// Switches to the other player, terminating the current round.
    ///
    /// Skipping a round without having played is not allowed.
    pub fn next_round(&mut self) -> Result<Player, GameError> {
        if !self.has_moved {
            return Err(GameError::MoveRequired);
        }

        self.has_moved = false;
        self.current_player = self.current_player.opponent();

        Ok(self.current_player)
    }

    pub fn pawns_for(&self, owner: Player) -> u32 {
        match owner {
            Player::White => self.white_pawns,
            Player::Black => self.black_pawns,
        }
    }

    /// Removes one pawn of given owner from the board count.
    pub fn take_pawn(&mut self, owner: Player) {
        match owner {
            Player::White => self.white_pawns -= 1,
            Player::Black => self.black_pawns -= 1,
        }
    }

    /// Adds one pawn of given owner to the board count.
    pub fn add_pawn(&mut self, owner: Player) {
        match owner {
            Player::White => self.white_pawns += 1,
            Player::Black => self.black_pawns += 1,
        }
    }

    /// Winner by pawn starvation: a player under the loss threshold makes
    /// its opponent win.
    pub fn victory_by_threshold(&self) -> Option<Player> {
        if self.white_pawns < self.loss_threshold {
            Some(Player::Black)
        } else if self.black_pawns < self.loss_threshold {
            Some(Player::White)
        } else {
            None
        }
    }
}

/// A turn-based board minigame played by two players on a [`Grid`].
///
/// Implementations compose a [`GameCore`] and define the game-specific move
/// rules in `play`; the controlling service drives the execution flow
/// through the provided methods.
pub trait BoardGame {
    fn core(&self) -> &GameCore;
    fn core_mut(&mut self) -> &mut GameCore;

    /// Plays given move for the current player, returning the grid changes.
    fn play(&mut self, from: Coordinates, to: Coordinates) -> Result<GridUpdate, GameError>;

    /// `true` once the current player can do nothing else this round.
    fn is_round_terminated(&self) -> bool;

    fn current_round(&self) -> Player {
        self.core().current_round()
    }

    /// Terminates the current round, switching to the other player.
    fn next_round(&mut self) -> Result<Player, GameError> {
        self.core_mut().next_round()
    }

    fn pawns_for(&self, owner: Player) -> u32 {
        self.core().pawns_for(owner)
    }

    /// Player who won the game, if it just ended.
    fn victory_for(&self) -> Option<Player> {
        self.core().victory_by_threshold()
    }
}
