//! Flow accumulation algorithm
//!
//! Calculates, for every cell, the number of cells (or the sum of weights)
//! draining through it, the cell itself included. Each cell is computed
//! once from the already-known values of its upstream neighbors, so the
//! whole grid is resolved in O(cells) whichever traversal is used.
//!
//! A cell whose contributing area cannot be known completely (it borders
//! the grid edge or a no-flow cell) can be flagged with a negative sign.

use super::flow_grid::FlowGrid;
use super::traversal::{check_depth, with_recursion_stack, Traversal};
use flowtrace_core::raster::neighbors::NEIGHBORS;
use flowtrace_core::raster::Raster;
use flowtrace_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::debug;

/// Parameters for flow accumulation
#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulationParams {
    /// Store possibly underestimated cells as negative values
    pub negative: bool,
    /// Write 0 instead of NaN for no-flow cells without inflow
    pub zero: bool,
    pub traversal: Traversal,
}

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = (FlowGrid, Option<Raster<f64>>);
    type Output = Raster<f64>;
    type Params = AccumulationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Count (or sum weights of) cells draining through each cell of a D8 grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (flow, weights) = input;
        flow_accumulation(&flow, weights.as_ref(), params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellState {
    Unprocessed,
    /// On the current search path; meeting it again means a flow loop
    InProgress,
    Done,
    /// Done, but some contributing area may be missing
    Underestimated,
}

struct Frame {
    row: usize,
    col: usize,
    /// Upstream neighbors already pushed; finalize when popped again
    expanded: bool,
}

struct Accumulator<'a> {
    flow: &'a FlowGrid,
    weights: Option<&'a Raster<f64>>,
    negative: bool,
    zero: bool,
    accum: Array2<f64>,
    state: Array2<CellState>,
}

impl<'a> Accumulator<'a> {
    fn new(flow: &'a FlowGrid, weights: Option<&'a Raster<f64>>, params: &AccumulationParams) -> Self {
        let shape = flow.shape();
        Self {
            flow,
            weights,
            negative: params.negative,
            zero: params.zero,
            accum: Array2::zeros(shape),
            state: Array2::from_elem(shape, CellState::Unprocessed),
        }
    }

    #[inline]
    fn weight(&self, row: usize, col: usize) -> f64 {
        match self.weights {
            Some(w) => w.value_at(row, col).unwrap_or(0.0),
            None => 1.0,
        }
    }

    /// Compute (row, col) from its finished upstream neighbors.
    fn finalize(&mut self, row: usize, col: usize) {
        let (rows, cols) = self.flow.shape();
        let center = self.flow.direction(row, col);

        let mut acc = self.weight(row, col);
        let mut inflow = false;
        let mut incomplete = false;

        for n in &NEIGHBORS {
            let Some((nr, nc)) = n.cell(row, col, rows, cols) else {
                incomplete = true;
                continue;
            };
            let neighbor = self.flow.direction(nr, nc);
            if n.flows_into(neighbor, center) {
                let up = self.accum[(nr, nc)];
                acc += if self.negative { up.abs() } else { up };
                inflow = true;
            } else if neighbor.is_none() {
                incomplete = true;
            }
        }

        let (value, state) = if center.is_none() && !inflow {
            let v = if self.zero { 0.0 } else { f64::NAN };
            (v, CellState::Done)
        } else if self.negative && incomplete {
            (-acc, CellState::Underestimated)
        } else {
            (acc, CellState::Done)
        };

        self.accum[(row, col)] = value;
        self.state[(row, col)] = state;
    }

    /// Mark (row, col) as entered; `Ok(false)` when it is already finished.
    #[inline]
    fn enter(&mut self, row: usize, col: usize) -> Result<bool> {
        match self.state[(row, col)] {
            CellState::Done | CellState::Underestimated => Ok(false),
            CellState::InProgress => Err(Error::FlowCycle { row, col }),
            CellState::Unprocessed => {
                self.state[(row, col)] = CellState::InProgress;
                Ok(true)
            }
        }
    }

    fn trace_up_iterative(&mut self, row: usize, col: usize, stack: &mut Vec<Frame>) -> Result<()> {
        let flow = self.flow;
        stack.push(Frame { row, col, expanded: false });

        while let Some(frame) = stack.pop() {
            if frame.expanded {
                self.finalize(frame.row, frame.col);
                continue;
            }
            if !self.enter(frame.row, frame.col)? {
                continue;
            }
            stack.push(Frame { expanded: true, ..frame });
            for (nr, nc) in flow.upstream_cells(frame.row, frame.col) {
                stack.push(Frame {
                    row: nr,
                    col: nc,
                    expanded: false,
                });
            }
        }
        Ok(())
    }

    fn trace_up_recursive(&mut self, row: usize, col: usize, depth: usize, max_depth: usize) -> Result<()> {
        if !self.enter(row, col)? {
            return Ok(());
        }
        check_depth(depth, max_depth)?;

        let flow = self.flow;
        for (nr, nc) in flow.upstream_cells(row, col) {
            self.trace_up_recursive(nr, nc, depth + 1, max_depth)?;
        }
        self.finalize(row, col);
        Ok(())
    }

    fn run(&mut self, traversal: Traversal) -> Result<()> {
        let (rows, cols) = self.flow.shape();
        let mut stack = Vec::new();

        for row in 0..rows {
            for col in 0..cols {
                if self.state[(row, col)] != CellState::Unprocessed {
                    continue;
                }
                match traversal {
                    Traversal::Iterative => self.trace_up_iterative(row, col, &mut stack)?,
                    Traversal::Recursive { max_depth } => self.trace_up_recursive(row, col, 0, max_depth)?,
                }
            }
        }
        Ok(())
    }
}

/// Calculate flow accumulation from a flow direction grid.
///
/// Every cell counts itself: a headwater cell has accumulation 1 (or its own
/// weight). Null weights count as 0. No-flow cells that receive nothing are
/// NaN, or 0 with `params.zero`.
///
/// With `params.negative`, cells that touch the grid edge or a no-flow
/// neighbor are stored as `-value`; magnitudes are summed downstream, so the
/// sign marks the cell alone and does not spread.
///
/// # Arguments
/// * `flow` - Normalized D8 direction grid
/// * `weights` - Optional per-cell weights, same shape as `flow`
/// * `params` - Sign/zero flags and traversal strategy
///
/// # Returns
/// Raster<f64> with accumulation values and NaN as no-data
pub fn flow_accumulation(
    flow: &FlowGrid,
    weights: Option<&Raster<f64>>,
    params: AccumulationParams,
) -> Result<Raster<f64>> {
    if let Some(w) = weights {
        flow.as_raster().ensure_same_shape(w)?;
    }

    let mut acc = Accumulator::new(flow, weights, &params);
    match params.traversal {
        Traversal::Iterative => acc.run(Traversal::Iterative)?,
        Traversal::Recursive { max_depth } => {
            acc = with_recursion_stack(max_depth, move || {
                acc.run(params.traversal)?;
                Ok(acc)
            })?;
        }
    }

    let underestimated = acc
        .state
        .iter()
        .filter(|&&s| s == CellState::Underestimated)
        .count();
    debug!(
        "Flow accumulation done: {} cells, {} flagged as underestimated",
        flow.len(),
        underestimated
    );

    flow.as_raster().with_same_meta(acc.accum, Some(f64::NAN))
}
