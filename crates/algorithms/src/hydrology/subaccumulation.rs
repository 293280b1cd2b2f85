//! Subaccumulation: remove the area above outlets from an accumulation grid
//!
//! After the pass, each outlet holds 0 and every cell downstream of it has
//! lost the outlet's contribution, so accumulation counts only the area
//! below the nearest upstream outlet.

use super::flow_grid::FlowGrid;
use super::outlets::{check_outlets, OutletCell};
use flowtrace_core::raster::Raster;
use flowtrace_core::Result;
use tracing::{debug, warn};

/// Subtract the accumulation of each outlet from everything downstream.
///
/// Outlets are applied in the order given. Each one reads its current
/// magnitude `s` (earlier outlets may already have reduced it), sets its own
/// cell to 0, then walks downstream decreasing the magnitude of each cell by
/// `s` while that magnitude exceeds `s`. Signs are kept. The walk stops at
/// NaN, at a cell that is not larger than `s`, or where the flow ends.
pub fn subaccumulation(flow: &FlowGrid, accum: &mut Raster<f64>, outlets: &[OutletCell]) -> Result<()> {
    flow.as_raster().ensure_same_shape(accum)?;
    check_outlets(outlets, flow.rows(), flow.cols())?;

    let max_steps = flow.len();
    let data = accum.data_mut();

    for outlet in outlets {
        let value = data[(outlet.row, outlet.col)];
        if value.is_nan() {
            warn!(
                "Outlet {} at cell ({}, {}) has no accumulation; skipped",
                outlet.id, outlet.row, outlet.col
            );
            continue;
        }

        let s = value.abs();
        data[(outlet.row, outlet.col)] = 0.0;

        let (mut row, mut col) = (outlet.row, outlet.col);
        let mut steps = 0;
        while let Some((nr, nc)) = flow.downstream(row, col) {
            if steps >= max_steps {
                warn!("Downstream walk from outlet {} did not terminate; stopped", outlet.id);
                break;
            }
            let v = data[(nr, nc)];
            if v.is_nan() || v.abs() <= s {
                break;
            }
            data[(nr, nc)] = v.signum() * (v.abs() - s);
            (row, col) = (nr, nc);
            steps += 1;
        }
        debug!("Outlet {}: removed {} from {} downstream cells", outlet.id, s, steps);
    }

    Ok(())
}
