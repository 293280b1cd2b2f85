//! I/O for rasters (GeoTIFF) and vector features (GeoJSON)

mod features;
mod native;

pub use features::{parse_coordinates, read_outlets_geojson, write_lines_geojson};
pub use native::{read_geotiff, write_geotiff};
