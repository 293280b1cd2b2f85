//! # FlowTrace Algorithms
//!
//! Hydrology over D8 flow direction grids.
//!
//! ## Available Algorithms
//!
//! - **flow accumulation**: counts or weighted sums, iterative or recursive
//! - **subaccumulation**: remove upstream area above outlets
//! - **subwatersheds**: label basins draining to each outlet
//! - **stream lines**: threshold-based stream polylines
//! - **longest flow path**: branch-and-bound search per outlet

pub mod hydrology;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        flow_accumulation, longest_flow_path, longest_flow_paths, resolve_outlets, stream_lines,
        subaccumulation, subwatersheds, AccumulationParams, ConfluenceMode, DirectionEncoding,
        FlowAccumulation, FlowGrid, LongestFlowPathParams, OutletCell, StreamLines, StreamParams,
        SubwatershedParams, Subwatersheds, Traversal,
    };
    pub use flowtrace_core::prelude::*;
}
