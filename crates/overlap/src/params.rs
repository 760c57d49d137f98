//! Caller-supplied analysis parameters and their validation.
//!
//! Radii and thresholds are checked at the boundary and rejected, never
//! clamped.

use crate::models::types::*;

/// Corridor / station buffer radius of the multi-line and proximity views
pub const DEFAULT_BUFFER_RADIUS_M: f64 = 400.0;

/// Corridor radius of the single-line view
pub const SINGLE_LINE_BUFFER_RADIUS_M: f64 = 500.0;

/// Alternative-overlap threshold, in percent
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 30.0;

/// Rows kept by the multi-line ranking
pub const DEFAULT_TOP_N: usize = 10;

/// Rows kept by the single-line ranking
pub const SINGLE_LINE_TOP_N: usize = 5;

/// Service category of trunk routes in the LTA route table
pub const TRUNK_CATEGORY: &str = "TRUNK";

/// Which bus routes take part in an analysis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteFilter {
    #[default]
    All,
    /// Drop lettered variants (`36A`, `961M`) and, where a category is
    /// known, anything not categorised `TRUNK`
    TrunkOnly,
}

/// Ranking key for overlap tables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RankBy {
    #[default]
    Length,
    Percentage,
}

/// One complete parameter set for an analysis pass
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisParams {
    pub buffer_radius_m: f64,
    pub threshold_percent: f64,
    pub top_n: usize,
    pub rank_by: RankBy,
    pub route_filter: RouteFilter,
}

impl AnalysisParams {
    /// Parameters of the single-line view: 500 m corridor, top 5 by percentage
    pub fn single_line() -> Self {
        Self {
            buffer_radius_m: SINGLE_LINE_BUFFER_RADIUS_M,
            top_n: SINGLE_LINE_TOP_N,
            rank_by: RankBy::Percentage,
            route_filter: RouteFilter::All,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_radius(self.buffer_radius_m)?;
        validate_threshold(self.threshold_percent)?;
        Ok(())
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            buffer_radius_m: DEFAULT_BUFFER_RADIUS_M,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            top_n: DEFAULT_TOP_N,
            rank_by: RankBy::Length,
            route_filter: RouteFilter::TrunkOnly,
        }
    }
}

/// Buffer radii must be positive and finite metres
pub fn validate_radius(radius_m: f64) -> Result<f64> {
    validate_positive("buffer radius", radius_m)
}

/// Thresholds must be positive and finite percentages
pub fn validate_threshold(threshold_percent: f64) -> Result<f64> {
    validate_positive("overlap threshold", threshold_percent)
}

fn validate_positive(name: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(AnalysisError::InvalidParameter {
            name,
            value,
            reason: "must be a finite number",
        });
    }
    if value <= 0.0 {
        return Err(AnalysisError::InvalidParameter {
            name,
            value,
            reason: "must be greater than zero",
        });
    }
    Ok(value)
}
