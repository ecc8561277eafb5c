//! Allocation Engine: hospital bed and ambulance selection under contention.
//!
//! Selection always works from fresh snapshots. A reservation commits through
//! [`Table::mutate`](crate::store::Table::mutate) with the version the candidate was read at;
//! if another request committed first the store reports `Conflict` and the whole selection is
//! recomputed from the top, up to [`RetryPolicy::max_attempts`] times with jittered backoff.
//!
//! The engine only reports exhaustion (`NoCapacity`, `NoAmbulanceAvailable`). What happens next
//! is the coordinator's decision.

mod ambulances;
mod beds;
pub mod scoring;

pub use ambulances::{AmbulanceAssignment, NearestAmbulance};
pub use scoring::Candidate;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{BedAllocation, BedType, Severity};
use crate::policy::{compatible_bed_types, AllocationRequest, PolicyGuard};
use crate::resilience::RetryPolicy;
use crate::store::EntityStore;
use chrono::{DateTime, Utc};
use healthguard_types::{CanonicalId, GeoPoint};
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

/// What a case needs from a hospital.
#[derive(Debug, Clone, PartialEq)]
pub struct BedRequest {
    pub case_id: CanonicalId,
    pub severity: Severity,
    pub required_capabilities: BTreeSet<String>,
    pub origin: GeoPoint,
    pub bed_count: u32,
    /// Restricts selection to this hospital. Policy rules still apply.
    pub preferred_hospital: Option<String>,
    pub preferred_bed_type: Option<BedType>,
}

/// A committed bed reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BedReservation {
    pub hospital_id: String,
    pub hospital_name: String,
    pub bed_type: BedType,
    pub allocation_ids: Vec<CanonicalId>,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub score: f64,
}

pub struct AllocationEngine {
    store: Arc<EntityStore>,
    guard: PolicyGuard,
    config: DispatchConfig,
}

impl AllocationEngine {
    pub fn new(store: Arc<EntityStore>, config: DispatchConfig) -> Self {
        Self {
            guard: PolicyGuard::new(config.limits),
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Every hospital that could take the request right now, best first.
    ///
    /// # Errors
    ///
    /// For a directed request, returns the policy violation (or `NotFound`) that rules the
    /// preferred hospital out, so the caller learns why rather than getting `NoCapacity`.
    pub fn rank_candidates(
        &self,
        request: &BedRequest,
        now: DateTime<Utc>,
    ) -> DispatchResult<Vec<Candidate>> {
        if let Some(hospital_id) = &request.preferred_hospital {
            let row = self.store.hospitals().get(hospital_id)?;
            let hospital = &row.value;
            let bed_type = scoring::pick_bed_type(
                hospital,
                request.severity,
                request.bed_count,
                request.preferred_bed_type,
            );
            // With no free bed the guard still runs against the most preferred type, so a
            // diverted or unqualified hospital is reported as such rather than as full.
            let checked_type = bed_type
                .or(request.preferred_bed_type)
                .or_else(|| compatible_bed_types(request.severity).first().copied());
            if let Some(checked_type) = checked_type {
                self.guard.check(
                    &AllocationRequest {
                        severity: request.severity,
                        bed_type: checked_type,
                        bed_count: request.bed_count,
                        required_capabilities: &request.required_capabilities,
                    },
                    hospital,
                    now,
                )?;
            }
            return Ok(
                scoring::evaluate(&self.config.weights, hospital, row.version, request, now)
                    .into_iter()
                    .collect(),
            );
        }

        let mut candidates: Vec<Candidate> = self
            .store
            .hospitals()
            .list(|_| true)
            .iter()
            .filter_map(|row| {
                scoring::evaluate(&self.config.weights, &row.value, row.version, request, now)
            })
            .collect();
        scoring::rank(&mut candidates);
        Ok(candidates)
    }

    /// Reserves `bed_count` beds at the best-scoring hospital.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] for a zero bed count
    /// - [`DispatchError::PolicyViolation`] if the guard rejects the request
    /// - [`DispatchError::NoCapacity`] if no hospital qualifies
    /// - [`DispatchError::AllocationFailed`] once conflict retries are exhausted
    pub async fn reserve_bed(&self, request: &BedRequest) -> DispatchResult<BedReservation> {
        if request.bed_count == 0 {
            return Err(DispatchError::Validation(
                "bed_count must be at least 1".into(),
            ));
        }
        if request.preferred_hospital.is_none() {
            // Directed requests get the whole rule chain, diversion first, in rank_candidates.
            self.guard.check_bed_count(request.bed_count)?;
        }

        let engine = self;
        with_conflict_retry(self.config.retry, "bed reservation", move || async move {
            let now = Utc::now();
            let candidates = engine.rank_candidates(request, now)?;
            let best = candidates.first().ok_or(DispatchError::NoCapacity)?;
            engine.commit_bed(request, best, now)
        })
        .await
    }

    fn commit_bed(
        &self,
        request: &BedRequest,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> DispatchResult<BedReservation> {
        // Allocation rows are inserted under the hospital lock; capacity updates count them
        // under the same lock.
        let (_, allocation_ids) = self.store.hospitals().mutate(
            &candidate.hospital_id,
            Some(candidate.version),
            |hospital| {
                self.guard.check(
                    &AllocationRequest {
                        severity: request.severity,
                        bed_type: candidate.bed_type,
                        bed_count: request.bed_count,
                        required_capabilities: &request.required_capabilities,
                    },
                    hospital,
                    now,
                )?;
                let capacity = hospital
                    .capacity
                    .get_mut(&candidate.bed_type)
                    .ok_or(DispatchError::NoCapacity)?;
                if capacity.available < request.bed_count {
                    return Err(DispatchError::NoCapacity);
                }
                capacity.available -= request.bed_count;
                hospital.last_updated = now;

                let mut ids = Vec::with_capacity(request.bed_count as usize);
                for _ in 0..request.bed_count {
                    let row = self.store.allocations().insert(BedAllocation {
                        id: CanonicalId::generate(),
                        hospital_id: candidate.hospital_id.clone(),
                        bed_type: candidate.bed_type,
                        case_id: request.case_id.clone(),
                        allocated_at: now,
                        released_at: None,
                    })?;
                    ids.push(row.value.id);
                }
                Ok(ids)
            },
        )?;

        tracing::info!(
            case_id = %request.case_id,
            hospital_id = %candidate.hospital_id,
            bed_type = %candidate.bed_type,
            beds = request.bed_count,
            score = candidate.score,
            "bed reserved"
        );

        Ok(BedReservation {
            hospital_id: candidate.hospital_id.clone(),
            hospital_name: candidate.hospital_name.clone(),
            bed_type: candidate.bed_type,
            allocation_ids,
            distance_km: candidate.distance_km,
            eta_minutes: self.config.eta_minutes(candidate.distance_km),
            score: candidate.score,
        })
    }
}

/// Runs `attempt` until it returns something other than `Conflict`, sleeping with jittered
/// backoff between tries. Exhaustion becomes [`DispatchError::AllocationFailed`].
async fn with_conflict_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> DispatchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DispatchResult<T>>,
{
    for n in 0..policy.max_attempts {
        match attempt().await {
            Err(err) if err.is_conflict() => {
                tracing::debug!(operation, attempt = n + 1, error = %err, "conflict, retrying");
                if n + 1 < policy.max_attempts {
                    tokio::time::sleep(policy.jittered(n)).await;
                }
            }
            other => return other,
        }
    }
    tracing::warn!(
        operation,
        attempts = policy.max_attempts,
        "conflict retries exhausted"
    );
    Err(DispatchError::AllocationFailed {
        attempts: policy.max_attempts,
    })
}
