//! Outlet points resolved to grid cells

use super::flow_grid::FlowGrid;
use flowtrace_core::vector::Outlet;
use flowtrace_core::{Error, Result};
use tracing::warn;

/// An outlet located on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutletCell {
    pub row: usize,
    pub col: usize,
    /// External id, or the 1-based position among the input outlets
    pub id: i32,
}

impl OutletCell {
    pub fn new(row: usize, col: usize, id: i32) -> Self {
        Self { row, col, id }
    }
}

/// Locate outlets on the grid.
///
/// Outlets outside the grid extent are skipped with a warning. Outlets
/// without an external id are numbered by their position in `outlets`,
/// starting at 1, so skipped outlets still consume their number.
pub fn resolve_outlets(outlets: &[Outlet], flow: &FlowGrid) -> Vec<OutletCell> {
    let (rows, cols) = flow.shape();
    let transform = flow.transform();

    outlets
        .iter()
        .enumerate()
        .filter_map(|(i, outlet)| {
            let id = outlet.id.unwrap_or(i as i32 + 1);
            match transform.geo_to_cell(outlet.x, outlet.y, rows, cols) {
                Some((row, col)) => Some(OutletCell { row, col, id }),
                None => {
                    warn!("Outlet {} at ({}, {}) is outside the grid; skipped", id, outlet.x, outlet.y);
                    None
                }
            }
        })
        .collect()
}

/// Fail with `IndexOutOfBounds` for the first outlet off the grid
pub(crate) fn check_outlets(outlets: &[OutletCell], rows: usize, cols: usize) -> Result<()> {
    match outlets.iter().find(|o| o.row >= rows || o.col >= cols) {
        Some(o) => Err(Error::IndexOutOfBounds {
            row: o.row,
            col: o.col,
            rows,
            cols,
        }),
        None => Ok(()),
    }
}
