//! # sg-overlap
//!
//! Geometric comparison of Singapore's bus network with its rail corridors.
//!
//! ## Features
//!
//! - **Path reconstruction**: ordered route and line polylines from stop and station tables
//! - **Metric projection**: UTM zone 48N for every length and buffer
//! - **Corridor overlap**: how much of each bus route runs inside a buffered MRT line
//! - **Stop proximity**: which stops of a route lie near any station
//! - **Alternative routes**: which services duplicate a given route
//!
//! ## Example
//!
//! ```
//! use sg_overlap::prelude::*;
//! use geo::Point;
//!
//! let stops = vec![
//!     StopRecord::new("36", Direction::Outbound, 1, Point::new(103.80, 1.35)),
//!     StopRecord::new("36", Direction::Outbound, 2, Point::new(103.81, 1.35)),
//! ];
//! let stations = vec![
//!     StationRecord::from_code("TE1", Point::new(103.80, 1.35)).unwrap(),
//!     StationRecord::from_code("TE2", Point::new(103.81, 1.35)).unwrap(),
//! ];
//!
//! let dataset = Dataset::from_records(stops, stations);
//! let report = line_overlaps(&dataset, &[LineCode::new("TE")], 400.0, RouteFilter::All).unwrap();
//!
//! let ranked = report.ranked(10, RankBy::Length);
//! assert_eq!(ranked.len(), 1);
//! assert!(ranked[0].percentage > 99.0);
//! ```

pub mod alternative;
pub mod corridor;
pub mod dataset;
pub mod geometry;
pub mod identifiers;
pub mod models;
pub mod overlap;
pub mod params;
pub mod path;
pub mod projection;
pub mod proximity;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::alternative::{compute_alternative_overlap, route_alternatives, AlternativeOverlap, CandidateOverlap};
    pub use crate::corridor::{build_combined_corridor, build_corridor, Corridor};
    pub use crate::dataset::{BusRoute, BusStop, Dataset, RailLine, RailStation};
    pub use crate::identifiers::*;
    pub use crate::models::types::*;
    pub use crate::overlap::{
        compute_overlap, line_overlaps, rank_routes, select_services, LineCorridor, OverlapMeasure,
        OverlapReport, OverlapResult,
    };
    pub use crate::params::*;
    pub use crate::path::{build_line_path, build_route_path, ProjectedPath};
    pub use crate::projection::{Projection, Utm};
    pub use crate::proximity::{
        classify_stops, network_proximity, route_proximity, ProximitySummary, StationBuffers, StopProximity,
    };
}

pub use prelude::*;
