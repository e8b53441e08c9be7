//! "Açores" minigame: normal moves and chained jump captures on a 5×5 grid.
use crate::axis::{AxisIterator, AxisType};
use crate::board::{BoardGame, GameCore, GameError, GridUpdate, Player};
use crate::grid::{Coordinates, Grid, Square, BLACK as B, EMPTY as E, WHITE as W};

/// One of the two available moves for this game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Normal,
    Jump,
}

/// Açores rules: a pawn moves one square in any direction onto a free
/// square, or jumps over an adjacent opponent pawn, capturing it. Jumps can
/// be chained within one round; a normal move terminates the round. A
/// player without pawns loses.
pub struct Acores {
    core: GameCore,
    last_move: Option<Move>,
}

impl Default for Acores {
    fn default() -> Self {
        Self::new()
    }
}

impl Acores {
    /// Initial configuration: 12 pawns for each player.
    pub fn new() -> Self {
        let initial_grid = vec![
            vec![W, W, W, B, B],
            vec![W, W, W, B, B],
            vec![W, W, E, B, B],
            vec![W, W, B, B, B],
            vec![W, W, B, B, B],
        ];

        Self {
            core: GameCore::new(Grid::new(initial_grid), 12, 12, 1),
            last_move: None,
        }
    }

    fn play_normal(
        &mut self,
        updates: &mut GridUpdate,
        mut move_axis: AxisIterator,
    ) -> Result<(), GameError> {
        let destination = move_axis.move_forward(self.core.grid())?;
        if destination != Square::Free {
            return Err(GameError::BadSquareState(
                "Movement destination is kept by another pawn".to_owned(),
            ));
        }

        let color = self.core.current_round().color();
        self.core.grid_mut().set(updates.move_origin, Square::Free)?;
        self.core.grid_mut().set(updates.move_destination, color)?;

        updates.updated_squares.push((updates.move_origin, Square::Free));
        updates.updated_squares.push((updates.move_destination, color));

        // No jump chaining after a normal move.
        self.last_move = Some(Move::Normal);

        Ok(())
    }

    fn play_jump(
        &mut self,
        updates: &mut GridUpdate,
        mut move_axis: AxisIterator,
    ) -> Result<(), GameError> {
        let current_player = self.core.current_round();
        let color = current_player.color();

        let skipped = move_axis.move_forward(self.core.grid())?;
        let skipped_position = move_axis.current_position();
        if skipped != color.flip() {
            return Err(GameError::BadSquareState(
                "Jumped square must contain a pawn of opponent color".to_owned(),
            ));
        }

        if move_axis.move_forward(self.core.grid())? != Square::Free {
            return Err(GameError::BadSquareState(
                "Movement destination is kept by another pawn".to_owned(),
            ));
        }

        self.core.grid_mut().set(updates.move_origin, Square::Free)?;
        self.core.grid_mut().set(skipped_position, Square::Free)?;
        self.core.grid_mut().set(updates.move_destination, color)?;

        // The jumped opponent pawn is captured.
        self.core.take_pawn(current_player.opponent());

        updates.updated_squares.push((updates.move_origin, Square::Free));
        updates.updated_squares.push((skipped_position, Square::Free));
        updates.updated_squares.push((updates.move_destination, color));

        // Another jump may be chained this round.
        self.last_move = Some(Move::Jump);

        Ok(())
    }
}

impl BoardGame for Acores {
    fn core(&self) -> &GameCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GameCore {
        &mut self.core
    }

    fn next_round(&mut self) -> Result<Player, GameError> {
        // The jump chain, if any, ends with the round.
        let next_player = self.core.next_round()?;
        self.last_move = None;

        Ok(next_player)
    }

    fn is_round_terminated(&self) -> bool {
        self.last_move == Some(Move::Normal)
    }

    fn play(&mut self, from: Coordinates, to: Coordinates) -> Result<GridUpdate, GameError> {
        let mut updates = GridUpdate::new(from, to);
        let move_axis =
            AxisIterator::new(self.core.grid(), from, to, &AxisType::EVERY_DIRECTION)?;

        if self.core.grid().get(from)? != self.core.current_round().color() {
            return Err(GameError::BadSquareState(
                "Action target square must be kept by a pawn of current player".to_owned(),
            ));
        }

        // Destination not passed yet, the returned distance is negative.
        match -move_axis.distance_from_destination() {
            1 => self.play_normal(&mut updates, move_axis)?,
            2 => self.play_jump(&mut updates, move_axis)?,
            _ => {
                return Err(GameError::BadCoordinates(
                    "Selected squares are too far, no available move".to_owned(),
                ))
            }
        }

        self.core.record_move();

        Ok(updates)
    }
}
