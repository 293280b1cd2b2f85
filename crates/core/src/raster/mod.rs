//! Raster data structures and the D8 direction model

mod direction;
mod element;
mod geotransform;
mod grid;
pub mod neighbors;

pub use direction::Direction;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
