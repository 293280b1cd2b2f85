//! Stream network extraction as polylines
//!
//! Cells whose accumulation magnitude reaches a threshold are stream cells.
//! Lines start at stream heads (stream cells fed by no other stream cell)
//! and follow the flow directions downstream. At confluences a line either
//! ends, with a new line starting below it, or continues along its main
//! branch, the upstream stream cell with the largest accumulation.

use super::flow_grid::FlowGrid;
use crate::maybe_rayon::*;
use flowtrace_core::raster::Raster;
use flowtrace_core::vector::{Line, LineCollection};
use flowtrace_core::{Algorithm, Error, Result};
use tracing::debug;

/// What a stream line does at a confluence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfluenceMode {
    /// End every line at the confluence and start a new one below it
    #[default]
    Split,
    /// Keep the main branch going; tributaries end at the confluence
    Continuous,
}

/// Parameters for stream extraction
#[derive(Debug, Clone, Copy)]
pub struct StreamParams {
    /// Minimum accumulation magnitude of a stream cell. Default: 1000.0
    pub threshold: f64,
    pub confluence: ConfluenceMode,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            threshold: 1000.0,
            confluence: ConfluenceMode::Split,
        }
    }
}

/// Stream line extraction algorithm
#[derive(Debug, Clone, Default)]
pub struct StreamLines;

impl Algorithm for StreamLines {
    type Input = (FlowGrid, Raster<f64>);
    type Output = LineCollection;
    type Params = StreamParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Stream Lines"
    }

    fn description(&self) -> &'static str {
        "Trace stream polylines over cells above an accumulation threshold"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (flow, accum) = input;
        stream_lines(&flow, &accum, params)
    }
}

struct StreamTracer<'a> {
    flow: &'a FlowGrid,
    accum: &'a Raster<f64>,
    threshold: f64,
    mode: ConfluenceMode,
}

impl StreamTracer<'_> {
    #[inline]
    fn is_stream(&self, row: usize, col: usize) -> bool {
        let v = self.accum.data()[(row, col)];
        !v.is_nan() && v.abs() >= self.threshold
    }

    /// Number of stream cells draining into (row, col) and the one with the
    /// largest accumulation (first in scan order on ties).
    fn stream_inflows(&self, row: usize, col: usize) -> (usize, Option<(usize, usize)>) {
        let mut count = 0;
        let mut main: Option<((usize, usize), f64)> = None;
        for (nr, nc) in self.flow.upstream_cells(row, col) {
            if !self.is_stream(nr, nc) {
                continue;
            }
            count += 1;
            let a = self.accum.data()[(nr, nc)].abs();
            if main.map_or(true, |(_, best)| a > best) {
                main = Some(((nr, nc), a));
            }
        }
        (count, main.map(|(cell, _)| cell))
    }

    fn is_start(&self, row: usize, col: usize) -> bool {
        if !self.is_stream(row, col) {
            return false;
        }
        let (count, _) = self.stream_inflows(row, col);
        count == 0 || (self.mode == ConfluenceMode::Split && count > 1)
    }

    /// Follow the flow from a start cell until the line has to end.
    fn trace(&self, row: usize, col: usize) -> Line {
        let mut points = vec![self.flow.cell_center(row, col)];
        let (mut row, mut col) = (row, col);

        for _ in 0..self.flow.len() {
            let Some((nr, nc)) = self.flow.downstream(row, col) else {
                break;
            };
            if !self.is_stream(nr, nc) {
                break;
            }
            points.push(self.flow.cell_center(nr, nc));

            let (count, main) = self.stream_inflows(nr, nc);
            if count > 1 {
                let keep_going = self.mode == ConfluenceMode::Continuous && main == Some((row, col));
                if !keep_going {
                    break;
                }
            }
            (row, col) = (nr, nc);
        }

        Line::new(points)
    }
}

/// Extract stream polylines from a direction grid and its accumulation.
///
/// Every line starts at a stream head (or, in split mode, just below a
/// confluence) and contains cell centers in downstream order. A line stops
/// at the grid edge, at a no-flow cell, before a cell below the threshold,
/// or at a confluence as dictated by `params.confluence`. Lines carry no id.
///
/// # Arguments
/// * `flow` - Normalized D8 direction grid
/// * `accum` - Accumulation raster of the same shape (signs are ignored)
/// * `params` - Threshold and confluence handling
pub fn stream_lines(flow: &FlowGrid, accum: &Raster<f64>, params: StreamParams) -> Result<LineCollection> {
    flow.as_raster().ensure_same_shape(accum)?;
    if !params.threshold.is_finite() {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
            reason: "must be a finite number".into(),
        });
    }

    let tracer = StreamTracer {
        flow,
        accum,
        threshold: params.threshold,
        mode: params.confluence,
    };
    let (rows, cols) = flow.shape();

    let lines: Vec<Line> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .filter(|&col| tracer.is_start(row, col))
                .map(|col| tracer.trace(row, col))
                .collect::<Vec<_>>()
        })
        .collect();

    debug!("Stream extraction: {} lines at threshold {}", lines.len(), params.threshold);
    Ok(LineCollection::from(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_accumulation::{flow_accumulation, AccumulationParams};
    use flowtrace_core::raster::Direction::{self, *};
    use flowtrace_core::GeoTransform;

    fn setup(dirs: &[Direction], rows: usize, cols: usize) -> (FlowGrid, Raster<f64>) {
        let mut flow = FlowGrid::from_directions(dirs, rows, cols).unwrap();
        flow.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        let acc = flow_accumulation(&flow, Option::None, AccumulationParams::default()).unwrap();
        (flow, acc)
    }

    fn params(threshold: f64, confluence: ConfluenceMode) -> StreamParams {
        StreamParams { threshold, confluence }
    }

    /// Two branches meeting at (2,2) and leaving south
    ///  SE  .  S
    ///  .  SE  S
    ///  .   .  S
    ///  .   .  S
    fn fork() -> (FlowGrid, Raster<f64>) {
        setup(
            &[
                SE, None, S, //
                None, SE, S, //
                None, None, S, //
                None, None, S,
            ],
            4,
            3,
        )
    }

    #[test]
    fn test_single_channel() {
        let (flow, acc) = setup(&[S, S, S, S], 4, 1);
        let lines = stream_lines(&flow, &acc, params(2.0, ConfluenceMode::Split)).unwrap();

        assert_eq!(lines.len(), 1);
        let line = &lines.lines[0];
        assert_eq!(line.len(), 3);
        assert_eq!(line.first().map(|c| c.y), Some(2.5));
        assert_eq!(line.last().map(|c| c.y), Some(0.5));
        assert_eq!(line.id, Option::None);
    }

    #[test]
    fn test_split_at_confluence() {
        let (flow, acc) = fork();
        // Accumulation: (0,0)=1 (0,2)=1 (1,1)=2 (1,2)=2 (2,2)=5 (3,2)=6
        assert_eq!(acc.get(2, 2).unwrap(), 5.0);

        let lines = stream_lines(&flow, &acc, params(1.0, ConfluenceMode::Split)).unwrap();
        // Two heads feed (0,0)->(1,1)->(2,2) and (0,2)->(1,2)->(2,2);
        // below the confluence (2,2)->(3,2)
        assert_eq!(lines.len(), 3);
        let mut lengths: Vec<usize> = lines.iter().map(|l| l.len()).collect();
        lengths.sort();
        assert_eq!(lengths, vec![2, 3, 3]);
    }

    #[test]
    fn test_continuous_follows_main_branch() {
        let (flow, acc) = fork();
        let lines = stream_lines(&flow, &acc, params(1.0, ConfluenceMode::Continuous)).unwrap();

        // Tie between (1,1) and (1,2): the first in scan order continues
        assert_eq!(lines.len(), 2);
        let long = lines.iter().find(|l| l.len() == 5).unwrap();
        assert_eq!(long.points().next(), Some(flow.cell_center(0, 0)));
        assert_eq!(long.points().last(), Some(flow.cell_center(3, 2)));
        assert!(lines.iter().any(|l| l.len() == 3));
    }

    #[test]
    fn test_threshold_excludes_cells() {
        let (flow, acc) = fork();
        let lines = stream_lines(&flow, &acc, params(5.0, ConfluenceMode::Split)).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines.lines[0].len(), 2);
        for line in lines.iter() {
            for (x, y) in line.points() {
                let (row, col) = flow.as_raster().cell_at(x, y).unwrap();
                assert!(acc.get(row, col).unwrap().abs() >= 5.0);
            }
        }
    }

    #[test]
    fn test_negative_accumulation_uses_magnitude() {
        let flow = FlowGrid::from_directions(&[S, S, S], 3, 1).unwrap();
        let acc = Raster::from_vec(vec![-1.0, -2.0, -3.0], 3, 1).unwrap();
        let lines = stream_lines(&flow, &acc, params(2.0, ConfluenceMode::Split)).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.lines[0].len(), 2);
    }

    #[test]
    fn test_invalid_threshold() {
        let (flow, acc) = fork();
        assert!(stream_lines(&flow, &acc, params(f64::NAN, ConfluenceMode::Split)).is_err());
    }
}
