//! "Bermudes" minigame: elimination and flip takes on a 9×9 grid.
use crate::axis::{AxisIterator, AxisType};
use crate::board::{BoardGame, GameCore, GameError, GridUpdate, Player};
use crate::grid::{Coordinates, Grid, Square, BLACK as B, EMPTY as E, WHITE as W};

/// One of the two available moves for this game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Elimination,
    Flip,
}

/// Bermudes rules: a pawn slides along a free trajectory. Landing on an
/// opponent pawn eliminates it and terminates the round; stopping right
/// after an opponent pawn flips it to the mover's color, and flips can be
/// chained. A player with fewer than 6 pawns loses.
pub struct Bermudes {
    core: GameCore,
    last_move: Option<Move>,
}

impl Default for Bermudes {
    fn default() -> Self {
        Self::new()
    }
}

impl Bermudes {
    /// Initial configuration: 27 pawns for each player.
    pub fn new() -> Self {
        let initial_grid = vec![
            vec![B, B, B, B, B, B, B, B, B],
            vec![B, B, B, B, B, B, B, B, B],
            vec![B, B, B, B, B, B, B, B, B],
            vec![E, E, E, E, E, E, E, E, E],
            vec![E, E, E, E, E, E, E, E, E],
            vec![E, E, E, E, E, E, E, E, E],
            vec![W, W, W, W, W, W, W, W, W],
            vec![W, W, W, W, W, W, W, W, W],
            vec![W, W, W, W, W, W, W, W, W],
        ];

        Self {
            core: GameCore::new(Grid::new(initial_grid), 27, 27, 6),
            last_move: None,
        }
    }

    /// Checks every square between the origin and the square at `until`
    /// relative to the destination to be empty, leaving the iterator there.
    fn check_free_trajectory(
        move_axis: &mut AxisIterator,
        grid: &Grid,
        until: i32,
    ) -> Result<(), GameError> {
        let mut next = move_axis.move_forward(grid)?;

        while move_axis.distance_from_destination() != until {
            if next != Square::Free {
                let position = move_axis.current_position();
                return Err(GameError::BadSquareState(format!(
                    "Square at {} {} inside trajectory isn't empty",
                    position.line, position.column
                )));
            }

            next = move_axis.move_forward(grid)?;
        }

        Ok(())
    }

    fn play_elimination(
        &mut self,
        updates: &mut GridUpdate,
        mut move_axis: AxisIterator,
    ) -> Result<(), GameError> {
        let current_player = self.core.current_round();

        if -move_axis.distance_from_destination() < 2 {
            return Err(GameError::BadCoordinates(
                "At least 1 square required between your pawn and the eliminated one".to_owned(),
            ));
        }

        Self::check_free_trajectory(&mut move_axis, self.core.grid(), 0)?;

        let color = current_player.color();
        self.core.grid_mut().set(updates.move_origin, Square::Free)?;
        self.core.grid_mut().set(updates.move_destination, color)?;

        // The pawn kept by the destination square is removed from the board.
        self.core.take_pawn(current_player.opponent());

        updates.updated_squares.push((updates.move_origin, Square::Free));
        updates.updated_squares.push((updates.move_destination, color));

        // No flip chaining after an elimination.
        self.last_move = Some(Move::Elimination);

        Ok(())
    }

    fn play_flip(
        &mut self,
        updates: &mut GridUpdate,
        mut move_axis: AxisIterator,
    ) -> Result<(), GameError> {
        let current_player = self.core.current_round();
        let color = current_player.color();

        // Every square up to the one right before the destination must be
        // empty; that last square holds the flipped pawn.
        Self::check_free_trajectory(&mut move_axis, self.core.grid(), -1)?;

        let flipped_position = move_axis.current_position();
        let flipped = self.core.grid().get(flipped_position)?;
        if flipped != color.flip() {
            return Err(GameError::BadSquareState(
                "Flipped square isn't kept by an opponent pawn".to_owned(),
            ));
        }

        self.core.grid_mut().set(updates.move_origin, Square::Free)?;
        self.core.grid_mut().set(flipped_position, color)?;
        self.core.grid_mut().set(updates.move_destination, color)?;

        // One opponent pawn was replaced by a pawn of ours.
        self.core.add_pawn(current_player);
        self.core.take_pawn(current_player.opponent());

        updates.updated_squares.push((updates.move_origin, Square::Free));
        updates.updated_squares.push((flipped_position, color));
        updates.updated_squares.push((updates.move_destination, color));

        // Flip chaining is still available this round.
        self.last_move = Some(Move::Flip);

        Ok(())
    }
}

impl BoardGame for Bermudes {
    fn core(&self) -> &GameCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GameCore {
        &mut self.core
    }

    fn next_round(&mut self) -> Result<Player, GameError> {
        // The flip chain, if any, ends with the round.
        let next_player = self.core.next_round()?;
        self.last_move = None;

        Ok(next_player)
    }

    fn is_round_terminated(&self) -> bool {
        self.last_move == Some(Move::Elimination)
    }

    fn play(&mut self, from: Coordinates, to: Coordinates) -> Result<GridUpdate, GameError> {
        let color = self.core.current_round().color();
        let mut updates = GridUpdate::new(from, to);
        let move_axis =
            AxisIterator::new(self.core.grid(), from, to, &AxisType::EVERY_DIRECTION)?;

        if self.core.grid().get(from)? != color {
            return Err(GameError::BadSquareState(
                "Action target square must be kept by a pawn of current player".to_owned(),
            ));
        }

        // The destination state selects the move: an opponent pawn there is
        // eliminated, a free destination flips the pawn right before it.
        let destination_state = self.core.grid().get(to)?;
        if destination_state == Square::Free {
            self.play_flip(&mut updates, move_axis)?;
        } else if destination_state == color.flip() {
            self.play_elimination(&mut updates, move_axis)?;
        } else {
            return Err(GameError::BadSquareState(
                "Movement destination cannot be one of your pawns".to_owned(),
            ));
        }

        self.core.record_move();

        Ok(updates)
    }
}
