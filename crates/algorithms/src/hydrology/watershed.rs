//! Subwatershed delineation
//!
//! Labels every cell with the id of the outlet it drains to. Each outlet
//! claims its upstream area but stops at other outlets, so nested outlets
//! split a basin into non-overlapping subwatersheds.
//!
//! The direction grid is consumed and its buffer relabeled in place: a cell
//! is visited at most once, and its direction is read before it is
//! overwritten with an id.

use super::flow_grid::FlowGrid;
use super::outlets::{check_outlets, OutletCell};
use super::traversal::{check_depth, with_recursion_stack, Traversal};
use crate::maybe_rayon::*;
use flowtrace_core::raster::neighbors::NEIGHBORS;
use flowtrace_core::raster::{Direction, Raster};
use flowtrace_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::{debug, warn};

/// Id written to cells that drain to no outlet
pub const NO_WATERSHED: i32 = i32::MIN;

/// Parameters for subwatershed delineation
#[derive(Debug, Clone, Default)]
pub struct SubwatershedParams {
    pub outlets: Vec<OutletCell>,
    pub traversal: Traversal,
}

/// Subwatershed delineation algorithm
#[derive(Debug, Clone, Default)]
pub struct Subwatersheds;

impl Algorithm for Subwatersheds {
    type Input = FlowGrid;
    type Output = Raster<i32>;
    type Params = SubwatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Subwatersheds"
    }

    fn description(&self) -> &'static str {
        "Delineate non-overlapping subwatersheds above a set of outlets"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        subwatersheds(input, &params.outlets, params.traversal)
    }
}

struct Labeler<'a> {
    /// Direction codes until a cell is visited, watershed ids afterwards
    cells: &'a mut Array2<i32>,
    visited: Vec<bool>,
    rows: usize,
    cols: usize,
}

impl Labeler<'_> {
    /// Claim (nr, nc) if unvisited and `drains(direction)` holds for its
    /// original direction, which is returned.
    #[inline]
    fn claim(&mut self, nr: usize, nc: usize, drains: impl Fn(Direction) -> bool, id: i32) -> Option<Direction> {
        let idx = nr * self.cols + nc;
        if self.visited[idx] {
            return None;
        }
        let dir = Direction::from_code(self.cells[(nr, nc)]);
        if !drains(dir) {
            return None;
        }
        self.visited[idx] = true;
        self.cells[(nr, nc)] = id;
        Some(dir)
    }

    fn fill_iterative(&mut self, row: usize, col: usize, dir: Direction, id: i32) {
        let mut stack = vec![(row, col, dir)];
        while let Some((row, col, center)) = stack.pop() {
            for n in &NEIGHBORS {
                let Some((nr, nc)) = n.cell(row, col, self.rows, self.cols) else {
                    continue;
                };
                if let Some(d) = self.claim(nr, nc, |d| n.flows_into(d, center), id) {
                    stack.push((nr, nc, d));
                }
            }
        }
    }

    fn fill_recursive(&mut self, row: usize, col: usize, center: Direction, id: i32, depth: usize, max_depth: usize) -> Result<()> {
        check_depth(depth, max_depth)?;
        for n in &NEIGHBORS {
            let Some((nr, nc)) = n.cell(row, col, self.rows, self.cols) else {
                continue;
            };
            if let Some(d) = self.claim(nr, nc, |d| n.flows_into(d, center), id) {
                self.fill_recursive(nr, nc, d, id, depth + 1, max_depth)?;
            }
        }
        Ok(())
    }
}

/// Delineate subwatersheds above `outlets`.
///
/// All outlet cells are reserved before any filling starts, so an outlet's
/// area never extends past another outlet. Each outlet then claims the cells
/// draining to it that no earlier outlet claimed. Cells reaching no outlet
/// are set to [`NO_WATERSHED`], which is also the raster's no-data value.
/// When two outlets fall on the same cell, the first one wins.
///
/// # Arguments
/// * `flow` - Direction grid; its buffer becomes the output
/// * `outlets` - Outlets with their ids
/// * `traversal` - Iterative or depth-limited recursive fill
pub fn subwatersheds(flow: FlowGrid, outlets: &[OutletCell], traversal: Traversal) -> Result<Raster<i32>> {
    let (rows, cols) = flow.shape();
    check_outlets(outlets, rows, cols)?;
    let mut raster = flow.into_raster();
    raster.set_nodata(Some(NO_WATERSHED));
    if rows == 0 || cols == 0 {
        return Ok(raster);
    }

    let mut visited = vec![false; rows * cols];
    let mut seeds = Vec::with_capacity(outlets.len());
    for outlet in outlets {
        let idx = outlet.row * cols + outlet.col;
        if visited[idx] {
            warn!(
                "Outlet {} shares cell ({}, {}) with an earlier outlet; skipped",
                outlet.id, outlet.row, outlet.col
            );
            continue;
        }
        visited[idx] = true;
        let dir = Direction::from_code(raster.data()[(outlet.row, outlet.col)]);
        seeds.push((*outlet, dir));
    }

    let visited = {
        let mut labeler = Labeler {
            cells: raster.data_mut(),
            visited,
            rows,
            cols,
        };
        for (outlet, _) in &seeds {
            labeler.cells[(outlet.row, outlet.col)] = outlet.id;
        }

        match traversal {
            Traversal::Iterative => {
                for &(outlet, dir) in &seeds {
                    labeler.fill_iterative(outlet.row, outlet.col, dir, outlet.id);
                }
            }
            Traversal::Recursive { max_depth } => {
                labeler = with_recursion_stack(max_depth, move || {
                    for &(outlet, dir) in &seeds {
                        labeler.fill_recursive(outlet.row, outlet.col, dir, outlet.id, 0, max_depth)?;
                    }
                    Ok(labeler)
                })?;
            }
        }
        labeler.visited
    };

    let labeled = visited.iter().filter(|&&v| v).count();
    debug!("Subwatersheds: {} of {} cells drain to an outlet", labeled, rows * cols);

    let data = raster
        .data_mut()
        .as_slice_mut()
        .ok_or_else(|| Error::Other("watershed buffer is not contiguous".into()))?;
    data.par_chunks_mut(cols)
        .zip(visited.par_chunks(cols))
        .for_each(|(row, seen)| {
            for (cell, &v) in row.iter_mut().zip(seen) {
                if !v {
                    *cell = NO_WATERSHED;
                }
            }
        });

    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrace_core::raster::Direction::*;

    fn grid(dirs: &[Direction], rows: usize, cols: usize) -> FlowGrid {
        FlowGrid::from_directions(dirs, rows, cols).unwrap()
    }

    fn both(flow: &FlowGrid, outlets: &[OutletCell]) -> Raster<i32> {
        let it = subwatersheds(flow.clone(), outlets, Traversal::Iterative).unwrap();
        let rec = subwatersheds(flow.clone(), outlets, Traversal::recursive()).unwrap();
        assert_eq!(it.data(), rec.data());
        it
    }

    /// 5x5 grid where every cell drains south, then the bottom row drains
    /// east towards (4,4).
    fn south_then_east() -> FlowGrid {
        let mut dirs = vec![S; 25];
        for col in 0..4 {
            dirs[20 + col] = E;
        }
        dirs[24] = None;
        grid(&dirs, 5, 5)
    }

    #[test]
    fn test_single_outlet_claims_everything() {
        let ws = both(&south_then_east(), &[OutletCell::new(4, 4, 7)]);
        assert!(ws.data().iter().all(|&v| v == 7));
        assert_eq!(ws.nodata(), Some(NO_WATERSHED));
    }

    #[test]
    fn test_nested_outlets_partition() {
        let outlets = [OutletCell::new(4, 4, 1), OutletCell::new(2, 1, 2)];
        let ws = both(&south_then_east(), &outlets);

        // Column 1 above and at row 2 belongs to the inner outlet
        assert_eq!(ws.get(0, 1).unwrap(), 2);
        assert_eq!(ws.get(1, 1).unwrap(), 2);
        assert_eq!(ws.get(2, 1).unwrap(), 2);
        // Below the inner outlet the outer one takes over
        assert_eq!(ws.get(3, 1).unwrap(), 1);
        assert_eq!(ws.get(0, 0).unwrap(), 1);
        assert_eq!(ws.get(4, 4).unwrap(), 1);

        let count = |id| ws.data().iter().filter(|&&v| v == id).count();
        assert_eq!(count(2), 3);
        assert_eq!(count(1), 22);
    }

    #[test]
    fn test_order_of_outlets_does_not_matter() {
        let a = [OutletCell::new(4, 4, 1), OutletCell::new(2, 1, 2)];
        let b = [a[1], a[0]];
        let flow = south_then_east();
        assert_eq!(both(&flow, &a).data(), both(&flow, &b).data());
    }

    #[test]
    fn test_unreached_cells_are_null() {
        // Two independent columns, outlet only on the right one
        let flow = grid(&[S, S, S, S], 2, 2);
        let ws = both(&flow, &[OutletCell::new(1, 1, 3)]);

        assert_eq!(ws.get(0, 1).unwrap(), 3);
        assert_eq!(ws.get(1, 1).unwrap(), 3);
        assert_eq!(ws.get(0, 0).unwrap(), NO_WATERSHED);
        assert_eq!(ws.value_at(1, 0), Option::None);
    }

    #[test]
    fn test_duplicate_outlet_first_wins() {
        let flow = grid(&[S, S], 2, 1);
        let ws = both(&flow, &[OutletCell::new(1, 0, 5), OutletCell::new(1, 0, 6)]);
        assert!(ws.data().iter().all(|&v| v == 5));
    }

    #[test]
    fn test_recursion_limit() {
        let flow = grid(&[S; 40], 40, 1);
        let result = subwatersheds(flow, &[OutletCell::new(39, 0, 1)], Traversal::Recursive { max_depth: 5 });
        assert!(matches!(result, Err(Error::RecursionLimit { limit: 5 })));
    }

    #[test]
    fn test_algorithm_trait() {
        let params = SubwatershedParams {
            outlets: vec![OutletCell::new(0, 1, 9)],
            traversal: Traversal::Iterative,
        };
        let ws = Subwatersheds.execute(grid(&[E, E], 1, 2), params).unwrap();
        assert_eq!(ws.data().iter().copied().collect::<Vec<_>>(), vec![9, 9]);
    }
}
