//! D8 compass directions
//!
//! Direction encoding (counter-clockwise from north-east, degrees / 45):
//! ```text
//!   3  2  1
//!   4  0  8
//!   5  6  7
//! ```
//! 0 = no flow (sink, null or unrecognized input)

/// Flow direction of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    /// No outflow: sink, null, or a value no encoding recognizes
    #[default]
    None = 0,
    NE = 1,
    N = 2,
    NW = 3,
    W = 4,
    SW = 5,
    S = 6,
    SE = 7,
    E = 8,
}

impl Direction {
    /// The eight flowing directions in code order
    pub const ALL: [Direction; 8] = [
        Direction::NE,
        Direction::N,
        Direction::NW,
        Direction::W,
        Direction::SW,
        Direction::S,
        Direction::SE,
        Direction::E,
    ];

    /// Decode a compass code; anything outside 1..=8 is `None`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Direction::NE,
            2 => Direction::N,
            3 => Direction::NW,
            4 => Direction::W,
            5 => Direction::SW,
            6 => Direction::S,
            7 => Direction::SE,
            8 => Direction::E,
            _ => Direction::None,
        }
    }

    /// Direction pointing along (row_offset, col_offset)
    pub fn from_offset(dr: isize, dc: isize) -> Self {
        match (dr, dc) {
            (-1, 1) => Direction::NE,
            (-1, 0) => Direction::N,
            (-1, -1) => Direction::NW,
            (0, -1) => Direction::W,
            (1, -1) => Direction::SW,
            (1, 0) => Direction::S,
            (1, 1) => Direction::SE,
            (0, 1) => Direction::E,
            _ => Direction::None,
        }
    }

    /// Numeric compass code (0-8)
    pub fn code(self) -> u8 {
        self as u8
    }

    /// (row_offset, col_offset) of the receiving neighbor
    pub fn offset(self) -> Option<(isize, isize)> {
        match self {
            Direction::None => None,
            Direction::NE => Some((-1, 1)),
            Direction::N => Some((-1, 0)),
            Direction::NW => Some((-1, -1)),
            Direction::W => Some((0, -1)),
            Direction::SW => Some((1, -1)),
            Direction::S => Some((1, 0)),
            Direction::SE => Some((1, 1)),
            Direction::E => Some((0, 1)),
        }
    }

    /// The direction pointing back the other way
    pub fn opposite(self) -> Self {
        match self.offset() {
            Some((dr, dc)) => Direction::from_offset(-dr, -dc),
            None => Direction::None,
        }
    }

    pub fn is_diagonal(self) -> bool {
        matches!(self, Direction::NE | Direction::NW | Direction::SW | Direction::SE)
    }

    pub fn is_none(self) -> bool {
        self == Direction::None
    }

    /// Cell receiving the outflow of (row, col), or `None` when the flow
    /// stops here or leaves the grid.
    pub fn downstream(self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = self.offset()?;
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            return None;
        }
        Some((nr as usize, nc as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_code(dir.code() as i32), dir);
        }
        assert_eq!(Direction::from_code(0), Direction::None);
        assert_eq!(Direction::from_code(9), Direction::None);
        assert_eq!(Direction::from_code(-3), Direction::None);
    }

    #[test]
    fn test_opposite() {
        assert_eq!(Direction::E.opposite(), Direction::W);
        assert_eq!(Direction::N.opposite(), Direction::S);
        assert_eq!(Direction::NE.opposite(), Direction::SW);
        assert_eq!(Direction::SE.opposite(), Direction::NW);
        assert_eq!(Direction::None.opposite(), Direction::None);
    }

    #[test]
    fn test_downstream_leaves_grid() {
        assert_eq!(Direction::E.downstream(0, 2, 1, 3), None);
        assert_eq!(Direction::W.downstream(0, 2, 1, 3), Some((0, 1)));
        assert_eq!(Direction::None.downstream(0, 1, 1, 3), None);
        assert_eq!(Direction::SE.downstream(1, 1, 3, 3), Some((2, 2)));
    }
}
