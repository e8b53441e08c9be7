//! "Canaries" minigame: orthogonal moves and jump captures on a 4×4 grid.
use crate::axis::{AxisIterator, AxisType};
use crate::board::{BoardGame, GameCore, GameError, GridUpdate, Player};
use crate::grid::{Coordinates, Grid, Square, BLACK as B, WHITE as W};

/// Canaries rules: one orthogonal move per round, either one square onto a
/// free destination, or a jump over an own pawn onto an opponent pawn which
/// gets eaten. A blocked player loses, as does a player with fewer than 2
/// pawns.
pub struct Canaries {
    core: GameCore,
}

impl Default for Canaries {
    fn default() -> Self {
        Self::new()
    }
}

impl Canaries {
    /// Initial configuration: 8 pawns for each player.
    pub fn new() -> Self {
        let initial_grid = vec![
            vec![B, B, B, B],
            vec![B, B, B, B],
            vec![W, W, W, W],
            vec![W, W, W, W],
        ];

        Self {
            core: GameCore::new(Grid::new(initial_grid), 8, 8, 2),
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

        Ok(())
    }

    fn play_eat(
        &mut self,
        updates: &mut GridUpdate,
        mut move_axis: AxisIterator,
    ) -> Result<(), GameError> {
        let current_player = self.core.current_round();
        let color = current_player.color();

        // The jumped square must hold one of the mover's own pawns.
        if move_axis.move_forward(self.core.grid())? != color {
            return Err(GameError::BadSquareState(
                "Jumped over square doesn't contain one of your pawns".to_owned(),
            ));
        }

        let eaten = move_axis.move_forward(self.core.grid())?;
        if eaten != color.flip() {
            return Err(GameError::BadSquareState(
                "Movement destination doesn't contain an opponent pawn to eat".to_owned(),
            ));
        }

        self.core.grid_mut().set(updates.move_origin, Square::Free)?;
        self.core.grid_mut().set(updates.move_destination, color)?;

        self.core.take_pawn(current_player.opponent());

        updates.updated_squares.push((updates.move_origin, Square::Free));
        updates.updated_squares.push((updates.move_destination, color));

        Ok(())
    }

    /// `true` if given player has no normal move and no jump available.
    fn is_blocked(&self, player: Player) -> bool {
        let player_color = player.color();
        let grid = self.core.grid();

        for line in 1..=grid.lines() {
            for column in 1..=grid.columns() {
                let checked_square = Coordinates { line, column };
                if grid.get(checked_square) != Ok(player_color) {
                    continue;
                }

                let orthogonal_vectors = [(1, 0), (-1, 0), (0, 1), (0, -1)];
                for (line_offset, column_offset) in orthogonal_vectors {
                    let neighbour = Coordinates {
                        line: line + line_offset,
                        column: column + column_offset,
                    };
                    let after_neighbour = Coordinates {
                        line: line + 2 * line_offset,
                        column: column + 2 * column_offset,
                    };

                    if !grid.is_inside(neighbour) {
                        continue;
                    }

                    let direct_neighbour =
                        grid.get(neighbour).expect("neighbour is inside grid");
                    if direct_neighbour == Square::Free {
                        return false;
                    }

                    // A jump is available over an own pawn onto an opponent
                    // pawn.
                    let jump_available = direct_neighbour == player_color
                        && grid.is_inside(after_neighbour)
                        && grid.get(after_neighbour) == Ok(player_color.flip());
                    if jump_available {
                        return false;
                    }
                }
            }
        }

        true
    }
}

impl BoardGame for Canaries {
    fn core(&self) -> &GameCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GameCore {
        &mut self.core
    }

    fn victory_for(&self) -> Option<Player> {
        // A player unable to play loses right away.
        if self.is_blocked(Player::White) {
            Some(Player::Black)
        } else if self.is_blocked(Player::Black) {
            Some(Player::White)
        } else {
            self.core.victory_by_threshold()
        }
    }

    fn is_round_terminated(&self) -> bool {
        // No chaining in this game, one move ends the round.
        self.core.has_moved()
    }

    fn play(&mut self, from: Coordinates, to: Coordinates) -> Result<GridUpdate, GameError> {
        let mut updates = GridUpdate::new(from, to);
        let move_axis = AxisIterator::new(
            self.core.grid(),
            from,
            to,
            &AxisType::EVERY_ORTHOGONAL_DIRECTION,
        )?;

        if self.core.grid().get(from)? != self.core.current_round().color() {
            return Err(GameError::BadSquareState(
                "Action target square must be kept by a pawn of current player".to_owned(),
            ));
        }

        match -move_axis.distance_from_destination() {
            1 => self.play_normal(&mut updates, move_axis)?,
            2 => self.play_eat(&mut updates, move_axis)?,
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

#[cfg(test)]
mod tests {
    use super::*;

    use crate::grid::EMPTY as E;

    fn coords(line: i32, column: i32) -> Coordinates {
        Coordinates { line, column }
    }

    #[test]
    fn initial_grid_has_8_pawns_each() {
        let game = Canaries::new();

        assert_eq!(game.pawns_for(Player::White), 8);
        assert_eq!(game.pawns_for(Player::Black), 8);
        // Both players start with jumps available, no one is blocked.
        assert_eq!(game.victory_for(), None);
    }

    #[test]
    fn jump_eats_the_opponent_pawn() {
        let mut game = Canaries::new();

        // White jumps from (4, 1) over its own pawn at (3, 1) onto the black
        // pawn at (2, 1).
        let updates = game.play(coords(4, 1), coords(2, 1)).unwrap();

        assert_eq!(
            updates.updated_squares,
            vec![
                (coords(4, 1), Square::Free),
                (coords(2, 1), Square::White),
            ]
        );
        assert_eq!(game.pawns_for(Player::Black), 7);
        assert!(game.is_round_terminated());
    }

    #[test]
    fn normal_move_needs_a_free_destination() {
        let mut game = Canaries::new();

        // Every white pawn is surrounded at game start, normal moves only
        // open up once squares free.
        assert!(matches!(
            game.play(coords(3, 1), coords(2, 1)),
            Err(GameError::BadSquareState(_))
        ));

        game.play(coords(4, 1), coords(2, 1)).unwrap();
        game.core_mut().next_round().unwrap();

        // (2, 1) now holds the white pawn which just landed there.
        assert!(matches!(
            game.play(coords(2, 2), coords(2, 1)),
            Err(GameError::BadSquareState(_))
        ));
    }

    #[test]
    fn diagonal_moves_are_rejected() {
        let mut game = Canaries::new();

        assert!(matches!(
            game.play(coords(3, 1), coords(2, 2)),
            Err(GameError::BadCoordinates(_))
        ));
    }

    #[test]
    fn jump_requires_own_pawn_in_between() {
        let mut game = Canaries::new();

        // (3, 1) to (1, 1) jumps over the black pawn at (2, 1).
        assert!(matches!(
            game.play(coords(3, 1), coords(1, 1)),
            Err(GameError::BadSquareState(_))
        ));
    }

    #[test]
    fn blocked_player_loses() {
        // Black's single pawn sits in a corner, walled in by white pawns it
        // cannot jump (the jumped square must be black's own).
        let mut game = Canaries::new();
        *game.core_mut() = GameCore::new(
            Grid::new(vec![
                vec![B, W, E, E],
                vec![W, E, E, E],
                vec![E, E, W, E],
                vec![E, E, E, W],
            ]),
            4,
            1,
            1,
        );

        assert!(game.is_blocked(Player::Black));
        assert_eq!(game.victory_for(), Some(Player::White));
    }
}
