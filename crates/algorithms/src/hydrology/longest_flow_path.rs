//! Longest flow path by branch-and-bound
//!
//! Starting at an outlet, the search moves upstream through neighbors with
//! strictly smaller accumulation. A branch holding `a` cells adds at most
//! `diagonal * a` to the length already walked (every cell in one diagonal
//! line). It adds at least the distance from the center of a square of `a`
//! cells to its edge, `(sqrt(a) - 1) / 2` of the shorter cell side: no
//! tighter packing exists in eight directions. Candidates are explored
//! longest-upper-bound first, and any candidate whose upper bound falls short
//! of the best candidate's lower bound is dropped. Headwaters (accumulation
//! 1) end a path; the longest ones win.

use super::flow_grid::FlowGrid;
use super::outlets::{check_outlets, OutletCell};
use super::traversal::{check_depth, with_recursion_stack, Traversal};
use crate::maybe_rayon::*;
use flowtrace_core::raster::neighbors::{Neighbor, NEIGHBORS};
use flowtrace_core::raster::Raster;
use flowtrace_core::vector::{Line, LineCollection};
use flowtrace_core::{Error, Result};
use tracing::debug;

/// Parameters for the longest flow path search
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestFlowPathParams {
    pub traversal: Traversal,
}

/// Steps walked upstream, by kind. Lengths derive from the counts so that
/// equally long paths compare exactly equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Steps {
    ns: u32,
    ew: u32,
    diagonal: u32,
}

impl Steps {
    fn after(self, n: &Neighbor) -> Self {
        let mut next = self;
        if n.is_diagonal() {
            next.diagonal += 1;
        } else if n.dr != 0 {
            next.ns += 1;
        } else {
            next.ew += 1;
        }
        next
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    col: usize,
    accum: f64,
    steps: Steps,
    min_length: f64,
    max_length: f64,
}

struct PathSearch<'a> {
    flow: &'a FlowGrid,
    accum: &'a Raster<f64>,
    ns_res: f64,
    ew_res: f64,
    diagonal: f64,
    min_step: f64,
    /// Headwaters of the longest paths found so far
    best: Vec<(usize, usize)>,
    best_length: f64,
}

impl<'a> PathSearch<'a> {
    fn new(flow: &'a FlowGrid, accum: &'a Raster<f64>) -> Self {
        let gt = flow.transform();
        Self {
            flow,
            accum,
            ns_res: gt.ns_res(),
            ew_res: gt.ew_res(),
            diagonal: gt.diagonal_length(),
            min_step: gt.ns_res().min(gt.ew_res()),
            best: Vec::new(),
            best_length: f64::NEG_INFINITY,
        }
    }

    fn length(&self, s: Steps) -> f64 {
        let diagonal = s.diagonal as f64 * self.diagonal;
        if self.ns_res == self.ew_res {
            (s.ns + s.ew) as f64 * self.ns_res + diagonal
        } else {
            s.ns as f64 * self.ns_res + s.ew as f64 * self.ew_res + diagonal
        }
    }

    #[inline]
    fn magnitude(&self, row: usize, col: usize) -> f64 {
        self.accum.data()[(row, col)].abs()
    }

    fn candidate(&self, row: usize, col: usize, steps: Steps) -> Candidate {
        let accum = self.magnitude(row, col);
        let down = self.length(steps);
        Candidate {
            row,
            col,
            accum,
            steps,
            min_length: down + (accum.sqrt() - 1.0).max(0.0) / 2.0 * self.min_step,
            max_length: down + self.diagonal * accum,
        }
    }

    /// Upstream candidates of `c`, best upper bound first, pruned.
    fn expand(&self, c: &Candidate) -> Vec<Candidate> {
        let mut next: Vec<Candidate> = NEIGHBORS
            .iter()
            .filter_map(|n| {
                let (nr, nc) = self.flow.upstream_neighbor(c.row, c.col, n)?;
                let a = self.magnitude(nr, nc);
                (a < c.accum).then(|| self.candidate(nr, nc, c.steps.after(n)))
            })
            .collect();

        next.sort_by(|a, b| b.max_length.total_cmp(&a.max_length));
        if let Some(bound) = next.first().map(|c| c.min_length) {
            next.retain(|c| c.max_length >= bound);
        }
        next
    }

    fn record_headwater(&mut self, c: &Candidate) {
        let length = self.length(c.steps);
        if length > self.best_length {
            self.best_length = length;
            self.best.clear();
            self.best.push((c.row, c.col));
        } else if length == self.best_length {
            self.best.push((c.row, c.col));
        }
    }

    #[inline]
    fn is_headwater(c: &Candidate) -> bool {
        c.accum <= 1.0
    }

    fn search_iterative(&mut self, start: Candidate) {
        let mut stack = vec![start];
        while let Some(c) = stack.pop() {
            if Self::is_headwater(&c) {
                self.record_headwater(&c);
                continue;
            }
            // Reversed so the best bound is popped first
            stack.extend(self.expand(&c).into_iter().rev());
        }
    }

    fn search_recursive(&mut self, c: Candidate, depth: usize, max_depth: usize) -> Result<()> {
        check_depth(depth, max_depth)?;
        if Self::is_headwater(&c) {
            self.record_headwater(&c);
            return Ok(());
        }
        for next in self.expand(&c) {
            self.search_recursive(next, depth + 1, max_depth)?;
        }
        Ok(())
    }

    /// Cell centers from `head` down to `outlet`
    fn trace_down(&self, head: (usize, usize), outlet: &OutletCell) -> Result<Line> {
        let (mut row, mut col) = head;
        let mut points = vec![self.flow.cell_center(row, col)];
        for _ in 0..self.flow.len() {
            if (row, col) == (outlet.row, outlet.col) {
                return Ok(Line::new(points).with_id(Some(outlet.id)));
            }
            let Some(next) = self.flow.downstream(row, col) else {
                break;
            };
            (row, col) = next;
            points.push(self.flow.cell_center(row, col));
        }
        Err(Error::Algorithm(format!(
            "headwater ({}, {}) does not drain to outlet {}",
            head.0, head.1, outlet.id
        )))
    }
}

/// Longest flow paths above a single outlet.
///
/// `accum` must be unweighted accumulation (signs are ignored). Every path
/// of maximal length is returned, each from its headwater down to the
/// outlet and tagged with the outlet id.
///
/// Fails with [`Error::NoHeadwater`] when no headwater is reachable, e.g.
/// when the outlet has no accumulation.
pub fn longest_flow_path(
    flow: &FlowGrid,
    accum: &Raster<f64>,
    outlet: &OutletCell,
    params: LongestFlowPathParams,
) -> Result<Vec<Line>> {
    flow.as_raster().ensure_same_shape(accum)?;
    check_outlets(std::slice::from_ref(outlet), flow.rows(), flow.cols())?;

    let mut search = PathSearch::new(flow, accum);
    let start = search.candidate(outlet.row, outlet.col, Steps::default());

    if !start.accum.is_nan() {
        match params.traversal {
            Traversal::Iterative => search.search_iterative(start),
            Traversal::Recursive { max_depth } => {
                search = with_recursion_stack(max_depth, move || {
                    search.search_recursive(start, 0, max_depth)?;
                    Ok(search)
                })?;
            }
        }
    }

    if search.best.is_empty() {
        return Err(Error::NoHeadwater {
            row: outlet.row,
            col: outlet.col,
        });
    }
    debug!(
        "Outlet {}: {} longest path(s) of length {}",
        outlet.id,
        search.best.len(),
        search.best_length
    );

    search
        .best
        .iter()
        .map(|&head| search.trace_down(head, outlet))
        .collect()
}

/// Longest flow paths for every outlet.
///
/// Outlets are searched in parallel; lines come out grouped by outlet in
/// input order.
pub fn longest_flow_paths(
    flow: &FlowGrid,
    accum: &Raster<f64>,
    outlets: &[OutletCell],
    params: LongestFlowPathParams,
) -> Result<LineCollection> {
    let per_outlet: Vec<Vec<Line>> = outlets
        .into_par_iter()
        .map(|outlet| longest_flow_path(flow, accum, outlet, params))
        .collect::<Result<_>>()?;

    Ok(LineCollection::from(per_outlet.into_iter().flatten().collect::<Vec<_>>()))
}
