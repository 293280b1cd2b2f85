//! Upstream neighbor relation
//!
//! Graph edges of a flow direction grid are never materialized. A neighbor B
//! of cell A is upstream of A when B points at A and A does not point back at
//! B; the second condition rejects two-cell mutual-flow loops. Longer loops
//! are not detected here.

use super::Direction;

/// One of the eight neighbors of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Row offset from the center cell
    pub dr: isize,
    /// Column offset from the center cell
    pub dc: isize,
    /// Direction the neighbor must have to drain into the center cell
    pub incoming: Direction,
    /// Direction of the center cell that would point at this neighbor
    pub opposite: Direction,
}

impl Neighbor {
    const fn new(dr: isize, dc: isize, incoming: Direction, opposite: Direction) -> Self {
        Self { dr, dc, incoming, opposite }
    }

    /// Whether a step to this neighbor is diagonal
    pub fn is_diagonal(&self) -> bool {
        self.dr != 0 && self.dc != 0
    }

    /// Position of this neighbor around (row, col), `None` when off-grid
    pub fn cell(&self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let nr = row as isize + self.dr;
        let nc = col as isize + self.dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            return None;
        }
        Some((nr as usize, nc as usize))
    }

    /// Whether a neighbor with direction `neighbor` drains into a center
    /// cell with direction `center`.
    pub fn flows_into(&self, neighbor: Direction, center: Direction) -> bool {
        neighbor == self.incoming && center != self.opposite
    }
}

/// Neighbors in scan order: top row left to right, middle row, bottom row.
pub const NEIGHBORS: [Neighbor; 8] = [
    Neighbor::new(-1, -1, Direction::SE, Direction::NW),
    Neighbor::new(-1, 0, Direction::S, Direction::N),
    Neighbor::new(-1, 1, Direction::SW, Direction::NE),
    Neighbor::new(0, -1, Direction::E, Direction::W),
    Neighbor::new(0, 1, Direction::W, Direction::E),
    Neighbor::new(1, -1, Direction::NE, Direction::SW),
    Neighbor::new(1, 0, Direction::N, Direction::S),
    Neighbor::new(1, 1, Direction::NW, Direction::SE),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_offsets() {
        for n in NEIGHBORS {
            assert_eq!(n.incoming, Direction::from_offset(-n.dr, -n.dc));
            assert_eq!(n.opposite, Direction::from_offset(n.dr, n.dc));
            assert_eq!(n.incoming.opposite(), n.opposite);
        }
    }

    #[test]
    fn test_mutual_flow_rejected() {
        // Neighbor east of the center points west, center points east
        let east = NEIGHBORS[4];
        assert!(east.flows_into(Direction::W, Direction::S));
        assert!(!east.flows_into(Direction::W, Direction::E));
        assert!(!east.flows_into(Direction::N, Direction::S));
    }

    #[test]
    fn test_neighbor_cell_bounds() {
        let nw = NEIGHBORS[0];
        assert_eq!(nw.cell(0, 0, 3, 3), None);
        assert_eq!(nw.cell(1, 1, 3, 3), Some((0, 0)));
        assert!(nw.is_diagonal());
        assert!(!NEIGHBORS[1].is_diagonal());
    }
}
