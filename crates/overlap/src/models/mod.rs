//! Records, keys and errors shared by every engine.

pub mod types;

// Re-exports for convenience
pub use types::{
    parse_station_code, AnalysisError, Direction, Result, RouteKey, StationRecord, StopRecord,
};
