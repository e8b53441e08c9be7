//! Iterator over the squares linking two grid positions along an axis.
use crate::board::GameError;
use crate::grid::{Coordinates, Grid, Square};

/// Direction from one square to another inside a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisType {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl AxisType {
    /// The 8 diagonal and orthogonal directions.
    pub const EVERY_DIRECTION: [AxisType; 8] = [
        AxisType::Up,
        AxisType::Down,
        AxisType::Left,
        AxisType::Right,
        AxisType::UpLeft,
        AxisType::UpRight,
        AxisType::DownLeft,
        AxisType::DownRight,
    ];

    /// The 4 orthogonal directions.
    pub const EVERY_ORTHOGONAL_DIRECTION: [AxisType; 4] = [
        AxisType::Up,
        AxisType::Down,
        AxisType::Left,
        AxisType::Right,
    ];

    /// The 4 diagonal directions.
    pub const EVERY_DIAGONAL_DIRECTION: [AxisType; 4] = [
        AxisType::UpLeft,
        AxisType::UpRight,
        AxisType::DownLeft,
        AxisType::DownRight,
    ];

    /// Line and column deltas moving one square toward this direction.
    fn vector(self) -> (i32, i32) {
        match self {
            AxisType::Up => (-1, 0),
            AxisType::Down => (1, 0),
            AxisType::Left => (0, -1),
            AxisType::Right => (0, 1),
            AxisType::UpLeft => (-1, -1),
            AxisType::UpRight => (-1, 1),
            AxisType::DownLeft => (1, -1),
            AxisType::DownRight => (1, 1),
        }
    }

    /// Axis linking two distinct squares, orthogonal or diagonal.
    fn between(from: Coordinates, to: Coordinates) -> Result<AxisType, GameError> {
        let relative_line = to.line - from.line;
        let relative_column = to.column - from.column;

        let aligned = relative_line == 0
            || relative_column == 0
            || relative_line.abs() == relative_column.abs();
        if (relative_line == 0 && relative_column == 0) || !aligned {
            return Err(GameError::BadCoordinates(
                "No orthogonal or diagonal axis linking these two squares".to_owned(),
            ));
        }

        Ok(match (relative_line.signum(), relative_column.signum()) {
            (-1, 0) => AxisType::Up,
            (1, 0) => AxisType::Down,
            (0, -1) => AxisType::Left,
            (0, 1) => AxisType::Right,
            (-1, -1) => AxisType::UpLeft,
            (-1, 1) => AxisType::UpRight,
            (1, -1) => AxisType::DownLeft,
            (1, 1) => AxisType::DownRight,
            _ => unreachable!("both deltas cannot be zero here"),
        })
    }
}

/// Walks the squares of an orthogonal or diagonal axis from an origin
/// square, through a destination square, until the grid border.
///
/// The iterator only holds coordinates; square states are read through the
/// grid at each step, and grid mutations are applied by the caller.
pub struct AxisIterator {
    direction: AxisType,
    axis: Vec<Coordinates>,
    current_position: usize,
    destination_position: usize,
}

impl AxisIterator {
    /// Axis linking `from` to `to`, both inside the grid, along one of the
    /// allowed directions.
    pub fn new(
        grid: &Grid,
        from: Coordinates,
        to: Coordinates,
        allowed_directions: &[AxisType],
    ) -> Result<Self, GameError> {
        if !grid.is_inside(from) || !grid.is_inside(to) {
            return Err(GameError::BadCoordinates(
                "Both of the two squares forming the axis must be inside grid".to_owned(),
            ));
        }

        let direction = AxisType::between(from, to)?;
        if !allowed_directions.contains(&direction) {
            return Err(GameError::BadCoordinates(
                "Direction between origin and destination isn't allowed".to_owned(),
            ));
        }

        let (line_delta, column_delta) = direction.vector();
        let mut axis = Vec::new();
        let mut destination_position = 0;

        let mut square = from;
        while grid.is_inside(square) {
            axis.push(square);
            if square == to {
                destination_position = axis.len() - 1;
            }

            square = Coordinates {
                line: square.line + line_delta,
                column: square.column + column_delta,
            };
        }

        Ok(Self {
            direction,
            axis,
            current_position: 0,
            destination_position,
        })
    }

    pub fn direction(&self) -> AxisType {
        self.direction
    }

    /// Coordinates of the square at the current iterator position.
    pub fn current_position(&self) -> Coordinates {
        self.axis[self.current_position]
    }

    /// `true` if a square remains toward the iterator direction.
    pub fn has_next(&self) -> bool {
        self.current_position + 1 < self.axis.len()
    }

    /// Squares between the current position and the destination; negative
    /// while the destination hasn't been passed yet.
    pub fn distance_from_destination(&self) -> i32 {
        self.current_position as i32 - self.destination_position as i32
    }

    /// Moves to the next square inside the axis and reads its state.
    pub fn move_forward(&mut self, grid: &Grid) -> Result<Square, GameError> {
        if !self.has_next() {
            return Err(GameError::BadCoordinates("End of axis reached".to_owned()));
        }

        self.current_position += 1;

        grid.get(self.axis[self.current_position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::grid::{BLACK, EMPTY, WHITE};

    fn coords(line: i32, column: i32) -> Coordinates {
        Coordinates { line, column }
    }

    fn grid_5x5() -> Grid {
        Grid::new(vec![
            vec![WHITE, EMPTY, EMPTY, EMPTY, BLACK],
            vec![EMPTY, EMPTY, EMPTY, EMPTY, EMPTY],
            vec![EMPTY, EMPTY, WHITE, EMPTY, EMPTY],
            vec![EMPTY, EMPTY, EMPTY, BLACK, EMPTY],
            vec![EMPTY, EMPTY, EMPTY, EMPTY, EMPTY],
        ])
    }

    #[test]
    fn axis_direction_is_computed_from_endpoints() {
        let grid = grid_5x5();

        let cases = [
            (coords(3, 3), coords(1, 3), AxisType::Up),
            (coords(3, 3), coords(5, 3), AxisType::Down),
            (coords(3, 3), coords(3, 1), AxisType::Left),
            (coords(3, 3), coords(3, 5), AxisType::Right),
            (coords(3, 3), coords(1, 1), AxisType::UpLeft),
            (coords(3, 3), coords(1, 5), AxisType::UpRight),
            (coords(3, 3), coords(5, 1), AxisType::DownLeft),
            (coords(3, 3), coords(5, 5), AxisType::DownRight),
        ];

        for (from, to, expected) in cases {
            let axis = AxisIterator::new(&grid, from, to, &AxisType::EVERY_DIRECTION).unwrap();
            assert_eq!(axis.direction(), expected);
        }
    }

    #[test]
    fn unaligned_squares_have_no_axis() {
        let grid = grid_5x5();

        assert!(AxisIterator::new(
            &grid,
            coords(1, 1),
            coords(2, 3),
            &AxisType::EVERY_DIRECTION
        )
        .is_err());
    }

    #[test]
    fn same_square_has_no_axis() {
        let grid = grid_5x5();

        assert!(AxisIterator::new(
            &grid,
            coords(3, 3),
            coords(3, 3),
            &AxisType::EVERY_DIRECTION
        )
        .is_err());
    }

    #[test]
    fn disallowed_direction_is_rejected() {
        let grid = grid_5x5();

        assert!(AxisIterator::new(
            &grid,
            coords(3, 3),
            coords(5, 5),
            &AxisType::EVERY_ORTHOGONAL_DIRECTION
        )
        .is_err());
    }

    #[test]
    fn outside_endpoints_are_rejected() {
        let grid = grid_5x5();

        assert!(AxisIterator::new(
            &grid,
            coords(0, 3),
            coords(3, 3),
            &AxisType::EVERY_DIRECTION
        )
        .is_err());
        assert!(AxisIterator::new(
            &grid,
            coords(3, 3),
            coords(3, 6),
            &AxisType::EVERY_DIRECTION
        )
        .is_err());
    }

    #[test]
    fn forward_walk_reads_square_states() {
        let grid = grid_5x5();
        let mut axis =
            AxisIterator::new(&grid, coords(1, 1), coords(5, 5), &AxisType::EVERY_DIRECTION)
                .unwrap();

        assert_eq!(axis.current_position(), coords(1, 1));
        assert_eq!(axis.distance_from_destination(), -4);

        assert_eq!(axis.move_forward(&grid).unwrap(), Square::Free);
        assert_eq!(axis.move_forward(&grid).unwrap(), Square::White);
        assert_eq!(axis.current_position(), coords(3, 3));
        assert_eq!(axis.distance_from_destination(), -2);

        assert_eq!(axis.move_forward(&grid).unwrap(), Square::Black);
        assert_eq!(axis.move_forward(&grid).unwrap(), Square::Free);
        assert_eq!(axis.distance_from_destination(), 0);
        assert!(!axis.has_next());
        assert!(axis.move_forward(&grid).is_err());
    }

    #[test]
    fn axis_continues_past_destination_until_border() {
        let grid = grid_5x5();
        let mut axis =
            AxisIterator::new(&grid, coords(1, 1), coords(1, 3), &AxisType::EVERY_DIRECTION)
                .unwrap();

        axis.move_forward(&grid).unwrap();
        axis.move_forward(&grid).unwrap();
        assert_eq!(axis.distance_from_destination(), 0);

        // Two more squares remain up to the border.
        assert_eq!(axis.move_forward(&grid).unwrap(), Square::Free);
        assert_eq!(axis.move_forward(&grid).unwrap(), Square::Black);
        assert_eq!(axis.distance_from_destination(), 2);
    }
}
