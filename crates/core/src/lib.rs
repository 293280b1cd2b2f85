//! # FlowTrace Core
//!
//! Core types, traits and I/O for the FlowTrace hydrology toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `Direction`: D8 compass codes and the upstream neighbor relation
//! - `Outlet` / `Line`: point inputs and polyline outputs
//! - I/O for GeoTIFF rasters and GeoJSON features

pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use error::{Error, Result};
pub use raster::{Direction, GeoTransform, Raster, RasterElement};
pub use vector::{Line, LineCollection, Outlet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Direction, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{Line, LineCollection, Outlet};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in FlowTrace.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
