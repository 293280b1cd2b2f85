//! Validated flow direction grid
//!
//! Raw direction rasters come in several encodings. `FlowGrid` normalizes
//! all of them to the compass codes of [`Direction`] (1=NE ... 8=E,
//! counter-clockwise, 0 = no flow) and answers the neighbor queries every
//! traversal is built on.

use crate::maybe_rayon::*;
use flowtrace_core::raster::neighbors::{Neighbor, NEIGHBORS};
use flowtrace_core::raster::{Direction, GeoTransform, Raster};
use flowtrace_core::{Error, Result};
use ndarray::Array2;
use tracing::{debug, warn};

/// Encoding of a raw direction raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionEncoding {
    /// Pick an encoding from the largest value present
    #[default]
    Auto,
    /// Degrees counter-clockwise from east: 45=NE, 90=N, ..., 360=E
    Degree,
    /// Degrees divided by 45: 1=NE, 2=N, ..., 8=E
    Degree45,
    /// Powers of two clockwise from east: 1=E, 2=SE, 4=S, ..., 128=NE
    Power2,
    /// Already normalized compass codes (same table as `Degree45`)
    Compass,
}

impl DirectionEncoding {
    /// Resolve `Auto` from the maximum raw value.
    ///
    /// The maximum must lie in 1..=360 for every encoding.
    pub fn resolve(self, max: i64) -> Result<Self> {
        if max <= 0 || max > 360 {
            return Err(Error::DirectionRange { max });
        }
        Ok(match self {
            DirectionEncoding::Auto if max <= 8 => DirectionEncoding::Degree45,
            DirectionEncoding::Auto if max <= 128 => DirectionEncoding::Power2,
            DirectionEncoding::Auto => DirectionEncoding::Degree,
            other => other,
        })
    }

    /// Decode one raw value; unrecognized values become `Direction::None`.
    pub fn decode(self, value: i64) -> Direction {
        match self {
            DirectionEncoding::Degree45 | DirectionEncoding::Compass | DirectionEncoding::Auto => {
                if (1..=8).contains(&value) {
                    Direction::from_code(value as i32)
                } else {
                    Direction::None
                }
            }
            DirectionEncoding::Degree => {
                if value > 0 && value <= 360 && value % 45 == 0 {
                    Direction::from_code((value / 45) as i32)
                } else {
                    Direction::None
                }
            }
            DirectionEncoding::Power2 => match value {
                1 => Direction::E,
                2 => Direction::SE,
                4 => Direction::S,
                8 => Direction::SW,
                16 => Direction::W,
                32 => Direction::NW,
                64 => Direction::N,
                128 => Direction::NE,
                _ => Direction::None,
            },
        }
    }
}

/// In-memory grid of normalized flow directions.
///
/// The codes live in a `Raster<i32>` so that subwatershed delineation can
/// take the grid by value and relabel the same buffer with watershed ids.
#[derive(Debug, Clone)]
pub struct FlowGrid {
    codes: Raster<i32>,
}

impl FlowGrid {
    /// Build a grid from a raw direction raster.
    ///
    /// Nodata cells and values the encoding does not recognize become
    /// `Direction::None`. Fails when the largest valid value is outside
    /// 1..=360 since no encoding can explain it.
    pub fn from_raster(raw: &Raster<i32>, encoding: DirectionEncoding) -> Result<Self> {
        let (rows, cols) = raw.shape();

        let max = raw
            .data()
            .iter()
            .filter(|&&v| !raw.is_nodata(v))
            .map(|&v| v as i64)
            .max()
            .unwrap_or(0);
        let encoding = encoding.resolve(max)?;
        debug!("Flow direction encoding {:?} (max raw value {})", encoding, max);

        let decoded: Vec<(Vec<i32>, usize)> = (0..rows)
            .into_par_iter()
            .map(|row| {
                let mut row_codes = vec![0i32; cols];
                let mut coerced = 0usize;
                for (col, code) in row_codes.iter_mut().enumerate() {
                    let value = raw.data()[(row, col)];
                    if raw.is_nodata(value) {
                        continue;
                    }
                    let dir = encoding.decode(value as i64);
                    if dir.is_none() && value != 0 {
                        coerced += 1;
                    }
                    *code = dir.code() as i32;
                }
                (row_codes, coerced)
            })
            .collect();

        let coerced: usize = decoded.iter().map(|(_, n)| n).sum();
        if coerced > 0 {
            warn!("{} flow direction values not valid for {:?}; treated as no flow", coerced, encoding);
        }

        let data: Vec<i32> = decoded.into_iter().flat_map(|(row, _)| row).collect();
        let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        let codes = raw.with_same_meta(array, None)?;

        Ok(Self { codes })
    }

    /// Build a grid directly from directions in row-major order.
    pub fn from_directions(directions: &[Direction], rows: usize, cols: usize) -> Result<Self> {
        let data = directions.iter().map(|d| d.code() as i32).collect();
        Ok(Self {
            codes: Raster::from_vec(data, rows, cols)?,
        })
    }

    pub fn rows(&self) -> usize {
        self.codes.rows()
    }

    pub fn cols(&self) -> usize {
        self.codes.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.codes.shape()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn transform(&self) -> &GeoTransform {
        self.codes.transform()
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.codes.set_transform(transform);
    }

    /// The normalized codes as a raster
    pub fn as_raster(&self) -> &Raster<i32> {
        &self.codes
    }

    /// Give up the grid, keeping its buffer for reuse
    pub(crate) fn into_raster(self) -> Raster<i32> {
        self.codes
    }

    /// Direction of (row, col). Panics when out of bounds.
    #[inline]
    pub fn direction(&self, row: usize, col: usize) -> Direction {
        Direction::from_code(self.codes.data()[(row, col)])
    }

    /// Neighbor `n` of (row, col) if it drains into (row, col).
    #[inline]
    pub fn upstream_neighbor(&self, row: usize, col: usize, n: &Neighbor) -> Option<(usize, usize)> {
        let (rows, cols) = self.shape();
        let (nr, nc) = n.cell(row, col, rows, cols)?;
        n.flows_into(self.direction(nr, nc), self.direction(row, col))
            .then_some((nr, nc))
    }

    /// All cells draining directly into (row, col), in neighbor scan order
    pub fn upstream_cells(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBORS
            .iter()
            .filter_map(move |n| self.upstream_neighbor(row, col, n))
    }

    /// Cell that (row, col) drains into.
    ///
    /// `None` at sinks, at the grid edge, and when the receiving cell points
    /// straight back (a two-cell loop is not a flow connection).
    #[inline]
    pub fn downstream(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let dir = self.direction(row, col);
        let (nr, nc) = dir.downstream(row, col, self.rows(), self.cols())?;
        (self.direction(nr, nc) != dir.opposite()).then_some((nr, nc))
    }

    /// Real-world center of (row, col)
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.codes.cell_center(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::*;

    #[test]
    fn test_auto_detection() {
        assert_eq!(DirectionEncoding::Auto.resolve(8).unwrap(), DirectionEncoding::Degree45);
        assert_eq!(DirectionEncoding::Auto.resolve(128).unwrap(), DirectionEncoding::Power2);
        assert_eq!(DirectionEncoding::Auto.resolve(9).unwrap(), DirectionEncoding::Power2);
        assert_eq!(DirectionEncoding::Auto.resolve(360).unwrap(), DirectionEncoding::Degree);
        assert!(matches!(
            DirectionEncoding::Auto.resolve(361),
            Err(Error::DirectionRange { max: 361 })
        ));
        assert!(DirectionEncoding::Auto.resolve(0).is_err());
        assert!(DirectionEncoding::Degree45.resolve(-4).is_err());
    }

    #[test]
    fn test_decode_tables() {
        assert_eq!(DirectionEncoding::Degree.decode(45), NE);
        assert_eq!(DirectionEncoding::Degree.decode(270), S);
        assert_eq!(DirectionEncoding::Degree.decode(360), E);
        assert_eq!(DirectionEncoding::Degree.decode(100), None);
        assert_eq!(DirectionEncoding::Power2.decode(1), E);
        assert_eq!(DirectionEncoding::Power2.decode(32), NW);
        assert_eq!(DirectionEncoding::Power2.decode(3), None);
        assert_eq!(DirectionEncoding::Degree45.decode(4), W);
        assert_eq!(DirectionEncoding::Degree45.decode(9), None);
    }

    #[test]
    fn test_from_raster_normalizes_and_coerces() {
        // Power-of-two grid with a nodata cell and an invalid value
        let mut raw = Raster::from_vec(vec![1, 4, -1, 128, 3, 64], 2, 3).unwrap();
        raw.set_nodata(Some(-1));
        raw.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));

        let grid = FlowGrid::from_raster(&raw, DirectionEncoding::Auto).unwrap();
        assert_eq!(grid.direction(0, 0), E);
        assert_eq!(grid.direction(0, 1), S);
        assert_eq!(grid.direction(0, 2), None);
        assert_eq!(grid.direction(1, 0), NE);
        assert_eq!(grid.direction(1, 1), None);
        assert_eq!(grid.direction(1, 2), N);
        assert_eq!(grid.transform(), raw.transform());
    }

    #[test]
    fn test_from_raster_rejects_out_of_range() {
        let raw = Raster::from_vec(vec![1, 400], 1, 2).unwrap();
        assert!(matches!(
            FlowGrid::from_raster(&raw, DirectionEncoding::Auto),
            Err(Error::DirectionRange { max: 400 })
        ));

        let raw = Raster::from_vec(vec![0, -5], 1, 2).unwrap();
        assert!(FlowGrid::from_raster(&raw, DirectionEncoding::Degree).is_err());
    }

    #[test]
    fn test_upstream_and_downstream() {
        // E E S
        // . . S
        // . . None
        let grid = FlowGrid::from_directions(&[E, E, S, None, None, S, None, None, None], 3, 3).unwrap();

        let up: Vec<_> = grid.upstream_cells(0, 2).collect();
        assert_eq!(up, vec![(0, 1)]);
        assert_eq!(grid.upstream_cells(2, 2).collect::<Vec<_>>(), vec![(1, 2)]);
        assert_eq!(grid.downstream(0, 0), Some((0, 1)));
        assert_eq!(grid.downstream(2, 2), Option::None);
        assert_eq!(grid.downstream(1, 2), Some((2, 2)));
    }

    #[test]
    fn test_mutual_pair_is_not_connected() {
        let grid = FlowGrid::from_directions(&[E, W], 1, 2).unwrap();
        assert_eq!(grid.downstream(0, 0), Option::None);
        assert_eq!(grid.upstream_cells(0, 1).count(), 0);
        assert_eq!(grid.upstream_cells(0, 0).count(), 0);
    }

    #[test]
    fn test_flow_off_grid_edge() {
        let grid = FlowGrid::from_directions(&[N, E], 1, 2).unwrap();
        assert_eq!(grid.downstream(0, 0), Option::None);
        assert_eq!(grid.downstream(0, 1), Option::None);
    }
}
