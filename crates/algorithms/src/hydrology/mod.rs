//! Hydrological analysis over D8 flow direction grids
//!
//! - Flow grid: direction decoding and the upstream neighbor relation
//! - Flow accumulation: cell counts or weight sums, optionally sign-flagged
//! - Subaccumulation: accumulation below the nearest upstream outlet
//! - Subwatersheds: non-overlapping basins above a set of outlets
//! - Stream lines: polylines over cells above an accumulation threshold
//! - Longest flow path: branch-and-bound search from each outlet

pub(crate) mod flow_accumulation;
pub(crate) mod flow_grid;
mod longest_flow_path;
mod outlets;
mod stream_network;
mod subaccumulation;
mod traversal;
mod watershed;

pub use flow_accumulation::{flow_accumulation, AccumulationParams, FlowAccumulation};
pub use flow_grid::{DirectionEncoding, FlowGrid};
pub use longest_flow_path::{longest_flow_path, longest_flow_paths, LongestFlowPathParams};
pub use outlets::{resolve_outlets, OutletCell};
pub use stream_network::{stream_lines, ConfluenceMode, StreamLines, StreamParams};
pub use subaccumulation::subaccumulation;
pub use traversal::Traversal;
pub use watershed::{subwatersheds, SubwatershedParams, Subwatersheds, NO_WATERSHED};
