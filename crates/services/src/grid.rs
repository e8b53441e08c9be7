//! Grid of squares making up a board game.
use std::fmt;

use crate::board::GameError;

/// State of a square inside a [`Grid`]: free, or kept by a player's pawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Square {
    Free,
    White,
    Black,
}

/// Shorthand for grid literals.
pub const EMPTY: Square = Square::Free;
/// Shorthand for grid literals.
pub const WHITE: Square = Square::White;
/// Shorthand for grid literals.
pub const BLACK: Square = Square::Black;

impl Square {
    /// Square kept by the opponent.
    ///
    /// # Panics
    ///
    /// Panics on a free square.
    pub fn flip(self) -> Square {
        match self {
            Square::White => Square::Black,
            Square::Black => Square::White,
            Square::Free => panic!("flippable only if it is kept by a player"),
        }
    }
}

impl fmt::Display for Square {
    /// Wire form of the square state, as carried by `SQUARE_UPDATE` events.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Square::Free => "FREE",
            Square::White => "WHITE",
            Square::Black => "BLACK",
        };

        write!(f, "{}", word)
    }
}

/// 1-based position of a square: `{ line: 2, column: 3 }` is the 3rd column
/// of the 2nd line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinates {
    pub line: i32,
    pub column: i32,
}

/// Rectangular grid of squares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    squares: Vec<Vec<Square>>,
}

impl Grid {
    /// Grid from a list of lines, each line a list of square states.
    ///
    /// # Panics
    ///
    /// Panics if the lines are empty or of unequal lengths; game boards are
    /// static definitions.
    pub fn new(initial_configuration: Vec<Vec<Square>>) -> Self {
        assert!(
            !initial_configuration.is_empty() && !initial_configuration[0].is_empty(),
            "zero dimension for height or width isn't allowed"
        );
        assert!(
            initial_configuration
                .iter()
                .all(|line| line.len() == initial_configuration[0].len()),
            "every line must have the same number of columns"
        );

        Self {
            squares: initial_configuration,
        }
    }

    pub fn lines(&self) -> i32 {
        self.squares.len() as i32
    }

    pub fn columns(&self) -> i32 {
        self.squares[0].len() as i32
    }

    /// `true` if a square exists at given coordinates: `1 <= line <= lines`
    /// and `1 <= column <= columns`.
    pub fn is_inside(&self, coords: Coordinates) -> bool {
        coords.line >= 1
            && coords.line <= self.lines()
            && coords.column >= 1
            && coords.column <= self.columns()
    }

    /// State of the square at given coordinates.
    pub fn get(&self, coords: Coordinates) -> Result<Square, GameError> {
        if !self.is_inside(coords) {
            return Err(GameError::BadCoordinates(
                "These coordinates aren't inside grid".to_owned(),
            ));
        }

        Ok(self.squares[(coords.line - 1) as usize][(coords.column - 1) as usize])
    }

    /// Replaces the state of the square at given coordinates.
    pub fn set(&mut self, coords: Coordinates, state: Square) -> Result<(), GameError> {
        if !self.is_inside(coords) {
            return Err(GameError::BadCoordinates(
                "These coordinates aren't inside grid".to_owned(),
            ));
        }

        self.squares[(coords.line - 1) as usize][(coords.column - 1) as usize] = state;

        Ok(())
    }
}
