//! Candidate enumeration and ranking for bed selection.

use super::BedRequest;
use crate::config::ScoringWeights;
use crate::models::{BedType, Hospital, Severity};
use crate::policy::compatible_bed_types;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A hospital and bed type that could satisfy a request, read at `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub hospital_id: String,
    pub hospital_name: String,
    pub version: u64,
    pub bed_type: BedType,
    pub available: u32,
    pub distance_km: f64,
    pub score: f64,
}

/// Composite score; lower is better.
///
/// `distance_km * w_distance + w_availability / available - w_capability * level_rank`, where
/// the trauma-level bonus only counts for high and critical cases, plus a flat penalty while
/// the hospital is on partial diversion.
pub fn score(
    weights: &ScoringWeights,
    hospital: &Hospital,
    severity: Severity,
    available: u32,
    distance_km: f64,
    now: DateTime<Utc>,
) -> f64 {
    let mut score = weights.distance * distance_km;
    score += weights.availability / f64::from(available.max(1));
    if severity >= Severity::High {
        score -= weights.capability * f64::from(hospital.level.rank());
    }
    if hospital.diversion.is_partial(now) {
        score += weights.partial_diversion_penalty;
    }
    score
}

/// The bed type to take at `hospital`: the preferred type if given, otherwise the first type
/// compatible with `severity` that has `bed_count` beds free.
pub fn pick_bed_type(
    hospital: &Hospital,
    severity: Severity,
    bed_count: u32,
    preferred: Option<BedType>,
) -> Option<BedType> {
    match preferred {
        Some(bed_type) => (hospital.available(bed_type) >= bed_count).then_some(bed_type),
        None => compatible_bed_types(severity)
            .iter()
            .copied()
            .find(|bt| hospital.available(*bt) >= bed_count),
    }
}

/// Evaluates one hospital against a request. Hospitals on full diversion, lacking a required
/// capability or without a suitable free bed yield `None`.
pub fn evaluate(
    weights: &ScoringWeights,
    hospital: &Hospital,
    version: u64,
    request: &BedRequest,
    now: DateTime<Utc>,
) -> Option<Candidate> {
    if hospital.diversion.blocks_all(now) || !hospital.has_capabilities(&request.required_capabilities)
    {
        return None;
    }
    let bed_type = pick_bed_type(
        hospital,
        request.severity,
        request.bed_count,
        request.preferred_bed_type,
    )?;
    let available = hospital.available(bed_type);
    let distance_km = request.origin.distance_km(&hospital.location);

    Some(Candidate {
        hospital_id: hospital.id.clone(),
        hospital_name: hospital.name.clone(),
        version,
        bed_type,
        available,
        distance_km,
        score: score(weights, hospital, request.severity, available, distance_km, now),
    })
}

/// Ascending score, ties broken by hospital id so the order never depends on map iteration.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| match a.score.total_cmp(&b.score) {
        Ordering::Equal => a.hospital_id.cmp(&b.hospital_id),
        other => other,
    });
}
