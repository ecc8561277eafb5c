//! Nearest-capable ambulance selection and ambulance state changes.

use super::{with_conflict_retry, AllocationEngine};
use crate::error::{DispatchError, DispatchResult, EntityKind};
use crate::models::{Ambulance, AmbulanceStatus, CapabilityLevel};
use crate::store::Versioned;
use chrono::{DateTime, Utc};
use healthguard_types::{CanonicalId, GeoPoint};
use serde::Serialize;

/// A unit committed to a case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbulanceAssignment {
    pub ambulance_id: String,
    pub unit_number: String,
    pub capability_level: CapabilityLevel,
    pub distance_km: f64,
    pub eta_minutes: u32,
}

/// Read-only answer to "which unit would be sent".
#[derive(Debug, Clone, PartialEq)]
pub struct NearestAmbulance {
    pub ambulance: Versioned<Ambulance>,
    pub distance_km: f64,
    pub eta_minutes: u32,
}

impl AllocationEngine {
    /// The closest available unit at or above `required`, ties broken by id.
    pub fn nearest_available(
        &self,
        origin: GeoPoint,
        required: CapabilityLevel,
    ) -> Option<NearestAmbulance> {
        self.store
            .ambulances()
            .list(|a| a.is_dispatchable(required))
            .into_iter()
            .map(|row| {
                let distance_km = origin.distance_km(&row.value.location);
                (row, distance_km)
            })
            // list() is sorted by id, so min_by keeps the first (smallest id) of equal distances
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(ambulance, distance_km)| NearestAmbulance {
                ambulance,
                distance_km,
                eta_minutes: self.config.eta_minutes(distance_km),
            })
    }

    /// Marks the nearest capable unit `dispatched` for `case_id`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NoAmbulanceAvailable`] if no unit qualifies
    /// - [`DispatchError::AllocationFailed`] once conflict retries are exhausted
    pub async fn reserve_ambulance(
        &self,
        case_id: &CanonicalId,
        origin: GeoPoint,
        required: CapabilityLevel,
    ) -> DispatchResult<AmbulanceAssignment> {
        let engine = self;
        with_conflict_retry(
            self.config.retry,
            "ambulance reservation",
            move || async move {
                let nearest = engine
                    .nearest_available(origin, required)
                    .ok_or(DispatchError::NoAmbulanceAvailable)?;
                engine.commit_ambulance(case_id, &nearest, Utc::now())
            },
        )
        .await
    }

    fn commit_ambulance(
        &self,
        case_id: &CanonicalId,
        nearest: &NearestAmbulance,
        now: DateTime<Utc>,
    ) -> DispatchResult<AmbulanceAssignment> {
        let id = &nearest.ambulance.value.id;
        let (row, ()) = self.store.ambulances().mutate(
            id,
            Some(nearest.ambulance.version),
            |ambulance| {
                ambulance.status = AmbulanceStatus::Dispatched;
                ambulance.assigned_case_id = Some(case_id.to_string());
                ambulance.last_updated = now;
                Ok(())
            },
        )?;

        tracing::info!(
            %case_id,
            ambulance_id = %id,
            distance_km = nearest.distance_km,
            "ambulance dispatched"
        );

        Ok(AmbulanceAssignment {
            ambulance_id: row.value.id,
            unit_number: row.value.unit_number,
            capability_level: row.value.capability_level,
            distance_km: nearest.distance_km,
            eta_minutes: nearest.eta_minutes,
        })
    }

    /// Returns a unit to `available` if it is still assigned to `case_id` and has not reached
    /// the scene. Returns the status it left, or `None` if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown ambulance.
    pub fn stand_down_ambulance(
        &self,
        ambulance_id: &str,
        case_id: &CanonicalId,
        now: DateTime<Utc>,
    ) -> DispatchResult<Option<AmbulanceStatus>> {
        self.free_ambulance(ambulance_id, case_id, AmbulanceStatus::can_stand_down, now)
    }

    /// Returns a `transporting` unit to `available` once its case is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown ambulance.
    pub fn complete_transport(
        &self,
        ambulance_id: &str,
        case_id: &CanonicalId,
        now: DateTime<Utc>,
    ) -> DispatchResult<Option<AmbulanceStatus>> {
        self.free_ambulance(
            ambulance_id,
            case_id,
            |status| status == AmbulanceStatus::Transporting,
            now,
        )
    }

    fn free_ambulance(
        &self,
        ambulance_id: &str,
        case_id: &CanonicalId,
        eligible: impl Fn(AmbulanceStatus) -> bool,
        now: DateTime<Utc>,
    ) -> DispatchResult<Option<AmbulanceStatus>> {
        let (_, previous) = self.store.ambulances().mutate(ambulance_id, None, |ambulance| {
            let assigned = ambulance.assigned_case_id.as_deref() == Some(case_id.as_str());
            if !assigned || !eligible(ambulance.status) {
                return Ok(None);
            }
            let previous = ambulance.status;
            ambulance.status = AmbulanceStatus::Available;
            ambulance.assigned_case_id = None;
            ambulance.last_updated = now;
            Ok(Some(previous))
        })?;
        if let Some(previous) = previous {
            tracing::info!(ambulance_id, %case_id, from = %previous, "ambulance returned to service");
        }
        Ok(previous)
    }

    /// Applies an ambulance state-machine edge.
    ///
    /// Leaving the service cycle (`available` or `out_of_service`) clears the case assignment.
    /// A unit committed to a live case cannot leave it this way before transport starts; the
    /// case has to be cancelled first, which stands the unit down.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] for an edge outside the table, or one that
    /// would detach the unit from a live case.
    pub fn update_ambulance_status(
        &self,
        ambulance_id: &str,
        next: AmbulanceStatus,
        now: DateTime<Utc>,
    ) -> DispatchResult<(Ambulance, AmbulanceStatus)> {
        let (row, previous) = self.store.ambulances().mutate(ambulance_id, None, |ambulance| {
            let previous = ambulance.status;
            if !previous.can_transition_to(next) || self.leaves_live_case(ambulance, next) {
                return Err(DispatchError::invalid_transition(
                    EntityKind::Ambulance,
                    ambulance_id,
                    previous,
                    next,
                ));
            }
            ambulance.status = next;
            if matches!(next, AmbulanceStatus::Available | AmbulanceStatus::OutOfService) {
                ambulance.assigned_case_id = None;
            }
            ambulance.last_updated = now;
            Ok(previous)
        })?;
        Ok((row.value, previous))
    }

    fn leaves_live_case(&self, ambulance: &Ambulance, next: AmbulanceStatus) -> bool {
        if !matches!(next, AmbulanceStatus::Available | AmbulanceStatus::OutOfService)
            || ambulance.status == AmbulanceStatus::Transporting
        {
            return false;
        }
        ambulance.assigned_case_id.as_deref().is_some_and(|case_id| {
            self.store
                .cases()
                .get(case_id)
                .is_ok_and(|row| !row.value.status.is_terminal())
        })
    }

    /// Records a GPS fix.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for a heading outside `[0, 360)` or a negative
    /// speed.
    pub fn update_location(
        &self,
        ambulance_id: &str,
        location: GeoPoint,
        heading: Option<f64>,
        speed_kmh: Option<f64>,
        now: DateTime<Utc>,
    ) -> DispatchResult<Ambulance> {
        if let Some(h) = heading {
            if !(0.0..360.0).contains(&h) {
                return Err(DispatchError::Validation(format!(
                    "heading must be in [0, 360), got {h}"
                )));
            }
        }
        if let Some(s) = speed_kmh {
            if !s.is_finite() || s < 0.0 {
                return Err(DispatchError::Validation(format!(
                    "speed must be non-negative, got {s}"
                )));
            }
        }
        let (row, ()) = self.store.ambulances().mutate(ambulance_id, None, |ambulance| {
            ambulance.location = location;
            ambulance.heading = heading;
            ambulance.speed_kmh = speed_kmh;
            ambulance.last_updated = now;
            Ok(())
        })?;
        Ok(row.value)
    }
}
