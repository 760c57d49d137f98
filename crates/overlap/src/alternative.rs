//! Alternative-route overlap between bus services.
//!
//! The shared length of two routes is the length of the reference route that
//! runs collinear with the candidate. Percentages are taken against the
//! reference only, so the measure is asymmetric: a short route inside a long
//! one overlaps it 100 %, the long one overlaps the short one much less.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Line, LineString};
use rstar::{RTree, RTreeObject};

use crate::dataset::Dataset;
use crate::geometry::{covered_length, planar_length, segment_length};
use crate::identifiers::ServiceIdentifier;
use crate::models::types::*;
use crate::params::{validate_threshold, RouteFilter};
use crate::spatial::SegmentNode;

/// How much of the reference one candidate shares
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CandidateOverlap {
    pub route: RouteKey,
    pub shared_length_m: f64,
    pub percentage: f64,
    pub exceeds_threshold: bool,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AlternativeOverlap {
    pub reference: RouteKey,
    pub reference_length_m: f64,
    pub threshold_percent: f64,
    /// Every candidate measured, in encounter order
    pub candidates: Vec<CandidateOverlap>,
    pub overlap_count: usize,
    /// Candidates at or above the threshold, in encounter order
    pub overlapping: Vec<RouteKey>,
}

impl AlternativeOverlap {
    /// Overlapping service numbers, first appearance kept
    pub fn overlapping_services(&self) -> Vec<ServiceIdentifier> {
        let mut services: Vec<ServiceIdentifier> = Vec::new();
        for key in &self.overlapping {
            if !services.contains(&key.service) {
                services.push(key.service.clone());
            }
        }
        services
    }
}

/// Length of `reference` (metric) running collinear with `candidate`.
///
/// Each stretch of road is counted once, whether the candidate or the
/// reference itself passes over it more than once.
pub fn shared_length(reference: &LineString, candidate: &LineString) -> f64 {
    let tree = RTree::bulk_load(
        candidate
            .lines()
            .filter(|l| segment_length(*l) > 0.0)
            .map(SegmentNode::new)
            .collect(),
    );

    let mut pieces: Vec<Line> = Vec::new();
    for segment in reference.lines().filter(|l| segment_length(*l) > 0.0) {
        let envelope = SegmentNode::new(segment).envelope();
        pieces.extend(
            tree.locate_in_envelope_intersecting(&envelope)
                .filter_map(|node| match line_intersection(segment, node.segment) {
                    Some(LineIntersection::Collinear { intersection }) => Some(intersection),
                    _ => None,
                }),
        );
    }

    covered_length(pieces)
}

/// Measure every candidate against the reference route.
///
/// Candidates sharing the reference's service number are skipped. A candidate
/// overlaps when its percentage is at least `threshold_percent`.
pub fn compute_alternative_overlap<'a>(
    reference: &RouteKey,
    reference_metric: &LineString,
    candidates: impl IntoIterator<Item = (&'a RouteKey, &'a LineString)>,
    threshold_percent: f64,
) -> Result<AlternativeOverlap> {
    let threshold_percent = validate_threshold(threshold_percent)?;
    let reference_length_m = planar_length(reference_metric);

    let measured: Vec<CandidateOverlap> = candidates
        .into_iter()
        .filter(|(key, _)| key.service != reference.service)
        .map(|(key, path)| {
            let shared_length_m = shared_length(reference_metric, path);
            let percentage = if reference_length_m > 0.0 {
                shared_length_m / reference_length_m * 100.0
            } else {
                0.0
            };

            CandidateOverlap {
                route: key.clone(),
                shared_length_m,
                percentage,
                exceeds_threshold: percentage >= threshold_percent,
            }
        })
        .collect();

    let overlapping: Vec<RouteKey> = measured
        .iter()
        .filter(|c| c.exceeds_threshold)
        .map(|c| c.route.clone())
        .collect();

    Ok(AlternativeOverlap {
        reference: reference.clone(),
        reference_length_m,
        threshold_percent,
        overlap_count: overlapping.len(),
        candidates: measured,
        overlapping,
    })
}

/// Alternative services for one route, drawn from every plottable route
/// passing `filter` in dataset order.
pub fn route_alternatives(
    dataset: &Dataset,
    key: &RouteKey,
    threshold_percent: f64,
    filter: RouteFilter,
) -> Result<AlternativeOverlap> {
    let reference = dataset.route(key)?;
    let reference_path = reference.projected_path()?;

    let candidates = dataset
        .plottable_routes(filter)
        .filter_map(|r| r.path.as_ref().map(|p| (&r.key, &p.metric)));

    let result = compute_alternative_overlap(key, &reference_path.metric, candidates, threshold_percent)?;

    log::info!(
        "{}: {} of {} candidate routes share at least {}%",
        key,
        result.overlap_count,
        result.candidates.len(),
        threshold_percent
    );

    Ok(result)
}
