//! Dispatch Coordinator: the emergency-case state machine.
//!
//! The coordinator drives a case through
//! `intake → triaged → bed_requested → bed_allocated → ambulance_assigned → en_route →
//! at_hospital → resolved`, delegating selection to the [`AllocationEngine`] and publishing
//! every committed transition to the configured [`EventSink`].
//!
//! Each case change is a single [`Table::mutate`](crate::store::Table::mutate) on the case, so
//! two requests racing on one case are serialised and the loser re-checks legality against the
//! winner's state. Cross-entity steps (bed, then case; ambulance, then case) are not atomic; a
//! step that fails after an earlier one committed is undone by a compensating action.

use crate::allocation::{AllocationEngine, AmbulanceAssignment, BedRequest};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult, EntityKind};
use crate::events::{EscalationHook, EventSink, Exhaustion, TransitionEvent};
use crate::models::{
    Ambulance, AmbulanceStatus, BedAllocation, BedCapacity, BedType, CaseStatus, Diversion,
    EmergencyCase, Hospital, TimelineEntry,
};
use crate::store::EntityStore;
use crate::triage::{self, TriageAssessment, TriageInput};
use crate::validation::CaseIntake;
use chrono::{DateTime, Utc};
use healthguard_types::{CanonicalId, GeoPoint};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const EVENT_ESCALATED: &str = "escalated";
const BED_ACTIVE: &str = "active";
const BED_RELEASED: &str = "released";
const NO_STATE: &str = "none";

/// Optional steering for a bed allocation. All fields default to automatic selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationDirective {
    pub hospital_id: Option<String>,
    pub bed_type: Option<BedType>,
    pub bed_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageOutcome {
    pub case: EmergencyCase,
    pub assessment: TriageAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationOutcome {
    pub case: EmergencyCase,
    pub hospital_id: String,
    pub hospital_name: String,
    pub bed_type: BedType,
    pub allocation_ids: Vec<CanonicalId>,
    pub distance_km: f64,
    pub eta_minutes: u32,
    /// True when the case already held this allocation and nothing new was reserved.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentOutcome {
    pub case: EmergencyCase,
    pub assignment: AmbulanceAssignment,
    pub reused: bool,
}

/// Result of one pass over waiting cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingSweep {
    pub attempted: usize,
    pub advanced: usize,
    pub waiting: usize,
    pub failed: usize,
}

pub struct DispatchCoordinator {
    store: Arc<EntityStore>,
    engine: AllocationEngine,
    sink: Arc<dyn EventSink>,
    escalation: Arc<dyn EscalationHook>,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<EntityStore>,
        config: DispatchConfig,
        sink: Arc<dyn EventSink>,
        escalation: Arc<dyn EscalationHook>,
    ) -> Self {
        Self {
            engine: AllocationEngine::new(Arc::clone(&store), config),
            store,
            sink,
            escalation,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.engine
    }

    pub fn config(&self) -> &DispatchConfig {
        self.engine.config()
    }

    // ========================================================================
    // Case queries
    // ========================================================================

    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown case.
    pub fn get_case(&self, case_id: &str) -> DispatchResult<EmergencyCase> {
        Ok(self.store.cases().get(case_id)?.value)
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown case.
    pub fn timeline(&self, case_id: &str) -> DispatchResult<Vec<TimelineEntry>> {
        Ok(self.get_case(case_id)?.timeline)
    }

    /// Non-terminal cases, most severe first, then oldest first.
    pub fn active_cases(&self) -> Vec<EmergencyCase> {
        let mut cases: Vec<EmergencyCase> = self
            .store
            .cases()
            .list(|c| !c.status.is_terminal())
            .into_iter()
            .map(|row| row.value)
            .collect();
        cases.sort_by(|a, b| a.priority_key().cmp(&b.priority_key()));
        cases
    }

    // ========================================================================
    // Case lifecycle
    // ========================================================================

    /// Opens a case in `intake`.
    ///
    /// # Errors
    ///
    /// Only fails if the generated id collides, which the store reports as `Duplicate`.
    pub fn create_case(&self, intake: CaseIntake) -> DispatchResult<EmergencyCase> {
        let now = Utc::now();
        let row = self.store.cases().insert(EmergencyCase::open(intake, now))?;
        let case = row.value;
        tracing::info!(case_id = %case.id, case_type = %case.case_type, "case opened");
        self.emit(TransitionEvent::new(
            EntityKind::EmergencyCase,
            case.id.as_str(),
            NO_STATE,
            case.status,
            now,
        ));
        Ok(case)
    }

    /// `intake → triaged`. A severity reported at intake is kept if it is worse than the
    /// assessed one.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown case
    /// - [`DispatchError::Validation`] for out-of-range vital signs (nothing is written)
    /// - [`DispatchError::InvalidTransition`] if the case is past intake
    pub fn triage(&self, case_id: &str, mut input: TriageInput) -> DispatchResult<TriageOutcome> {
        let current = self.get_case(case_id)?;
        input.case_type = current.case_type.clone();
        let assessment = triage::assess(&input)?;

        let now = Utc::now();
        let (row, from) = self.store.cases().mutate(case_id, None, |case| {
            let severity = case
                .severity
                .map_or(assessment.severity, |reported| reported.max(assessment.severity));
            let from = case.transition(
                CaseStatus::Triaged,
                format!(
                    "severity {severity} (confidence {:.2})",
                    assessment.confidence_score
                ),
                now,
            )?;
            case.severity = Some(severity);
            case.confidence_score = Some(assessment.confidence_score);
            case.required_capabilities = assessment.required_capabilities.clone();
            case.required_ambulance_level = triage::ambulance_level_for(severity);
            Ok(from)
        })?;

        self.case_event(&row.value, from, now);
        Ok(TriageOutcome {
            case: row.value,
            assessment,
        })
    }

    /// `triaged|bed_requested → bed_allocated`.
    ///
    /// Idempotent: a case that already holds a hospital gets its existing allocation back and
    /// nothing new is reserved. On `NoCapacity` the case stays in `bed_requested` and the
    /// escalation hook fires.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown case or directed hospital
    /// - [`DispatchError::InvalidTransition`] if the case is untriaged or terminal
    /// - [`DispatchError::PolicyViolation`], [`DispatchError::NoCapacity`] or
    ///   [`DispatchError::AllocationFailed`] from the engine
    pub async fn allocate(
        &self,
        case_id: &str,
        directive: AllocationDirective,
    ) -> DispatchResult<AllocationOutcome> {
        let case = self.get_case(case_id)?;
        if let Some(existing) = self.existing_allocation(&case)? {
            return Ok(existing);
        }

        let severity = match (case.status, case.severity) {
            (CaseStatus::Triaged | CaseStatus::BedRequested, Some(severity)) => severity,
            (status, _) => {
                return Err(case_transition_error(&case.id, status, CaseStatus::BedRequested))
            }
        };
        if case.status == CaseStatus::Triaged {
            self.request_bed(case_id)?;
        }

        let request = BedRequest {
            case_id: case.id.clone(),
            severity,
            required_capabilities: case.required_capabilities.clone(),
            origin: case.location,
            bed_count: directive.bed_count.unwrap_or(1),
            preferred_hospital: directive.hospital_id,
            preferred_bed_type: directive.bed_type,
        };
        let reservation = match self.engine.reserve_bed(&request).await {
            Ok(reservation) => reservation,
            Err(err) => {
                if err == DispatchError::NoCapacity {
                    self.escalate(case_id, Exhaustion::NoCapacity);
                }
                return Err(err);
            }
        };

        let now = Utc::now();
        let committed = self.store.cases().mutate(case_id, None, |case| {
            if case.status != CaseStatus::BedRequested {
                return Err(case_transition_error(
                    &case.id,
                    case.status,
                    CaseStatus::BedAllocated,
                ));
            }
            case.assigned_hospital_id = Some(reservation.hospital_id.clone());
            case.bed_allocation_ids = reservation.allocation_ids.clone();
            case.transition(
                CaseStatus::BedAllocated,
                format!(
                    "{} {} bed(s) at {}",
                    reservation.allocation_ids.len(),
                    reservation.bed_type,
                    reservation.hospital_id
                ),
                now,
            )
        });

        match committed {
            Ok((row, from)) => {
                for allocation_id in &reservation.allocation_ids {
                    self.emit(TransitionEvent::new(
                        EntityKind::BedAllocation,
                        allocation_id.as_str(),
                        NO_STATE,
                        BED_ACTIVE,
                        now,
                    ));
                }
                self.case_event(&row.value, from, now);
                Ok(AllocationOutcome {
                    case: row.value,
                    hospital_id: reservation.hospital_id,
                    hospital_name: reservation.hospital_name,
                    bed_type: reservation.bed_type,
                    allocation_ids: reservation.allocation_ids,
                    distance_km: reservation.distance_km,
                    eta_minutes: reservation.eta_minutes,
                    reused: false,
                })
            }
            Err(err) => {
                // Lost a race on the case (cancelled, or allocated by a concurrent request).
                tracing::debug!(case_id, error = %err, "case changed during allocation, releasing beds");
                self.engine.release_beds(&reservation.allocation_ids, now)?;
                let current = self.get_case(case_id)?;
                match self.existing_allocation(&current)? {
                    Some(existing) => Ok(existing),
                    None => Err(err),
                }
            }
        }
    }

    /// `bed_allocated → ambulance_assigned`.
    ///
    /// On `NoAmbulanceAvailable` the case keeps its bed, stays in `bed_allocated` and the
    /// escalation hook fires. If ambulance reservation fails outright the bed is released and
    /// the case returns to `bed_requested`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown case
    /// - [`DispatchError::InvalidTransition`] if the case has no bed yet or is terminal
    /// - [`DispatchError::NoAmbulanceAvailable`] or [`DispatchError::AllocationFailed`]
    pub async fn assign_ambulance(&self, case_id: &str) -> DispatchResult<AssignmentOutcome> {
        let case = self.get_case(case_id)?;
        match (case.status, case.assigned_ambulance_id.as_deref()) {
            (
                CaseStatus::AmbulanceAssigned | CaseStatus::EnRoute | CaseStatus::AtHospital,
                Some(ambulance_id),
            ) => {
                let assignment = self.describe_assignment(&case, ambulance_id)?;
                return Ok(AssignmentOutcome {
                    case,
                    assignment,
                    reused: true,
                });
            }
            // An ambulance kept through a re-route is reused rather than replaced.
            (CaseStatus::BedAllocated, Some(ambulance_id)) => {
                let ambulance_id = ambulance_id.to_owned();
                let row = self.commit_assignment(case_id, &ambulance_id)?;
                let assignment = self.describe_assignment(&row, &ambulance_id)?;
                return Ok(AssignmentOutcome {
                    case: row,
                    assignment,
                    reused: true,
                });
            }
            (CaseStatus::BedAllocated, None) => {}
            (status, _) => {
                return Err(case_transition_error(
                    &case.id,
                    status,
                    CaseStatus::AmbulanceAssigned,
                ))
            }
        }

        let assignment = match self
            .engine
            .reserve_ambulance(&case.id, case.location, case.required_ambulance_level)
            .await
        {
            Ok(assignment) => assignment,
            Err(DispatchError::NoAmbulanceAvailable) => {
                self.escalate(case_id, Exhaustion::NoAmbulanceAvailable);
                return Err(DispatchError::NoAmbulanceAvailable);
            }
            Err(err @ DispatchError::AllocationFailed { .. }) => {
                self.compensate_bed(case_id, "ambulance reservation failed")?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let now = Utc::now();
        self.emit(TransitionEvent::new(
            EntityKind::Ambulance,
            assignment.ambulance_id.as_str(),
            AmbulanceStatus::Available,
            AmbulanceStatus::Dispatched,
            now,
        ));

        match self.commit_assignment(case_id, &assignment.ambulance_id) {
            Ok(case) => Ok(AssignmentOutcome {
                case,
                assignment,
                reused: false,
            }),
            Err(err) => {
                tracing::debug!(case_id, error = %err, "case changed during dispatch, standing down");
                self.stand_down(&assignment.ambulance_id, &case.id, Utc::now());
                Err(err)
            }
        }
    }

    /// Explicit re-route: `bed_allocated|ambulance_assigned|en_route → bed_requested`.
    ///
    /// Held beds are released and the hospital is cleared; an assigned ambulance is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] from any other state.
    pub fn reroute(&self, case_id: &str, reason: &str) -> DispatchResult<EmergencyCase> {
        let now = Utc::now();
        let (row, (from, beds)) = self.store.cases().mutate(case_id, None, |case| {
            let from = case.transition(CaseStatus::BedRequested, format!("re-route: {reason}"), now)?;
            case.assigned_hospital_id = None;
            Ok((from, std::mem::take(&mut case.bed_allocation_ids)))
        })?;
        self.case_event(&row.value, from, now);
        self.release_and_publish(&beds, now)?;
        Ok(row.value)
    }

    /// Externally driven transitions: `en_route`, `at_hospital`, `resolved`, `cancelled`.
    ///
    /// Resolving a case returns its ambulance to service if it is still transporting.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] for a coordinator-driven target or an edge
    /// outside the table.
    pub fn update_status(&self, case_id: &str, target: CaseStatus) -> DispatchResult<EmergencyCase> {
        if target == CaseStatus::Cancelled {
            return self.cancel(case_id, "cancelled on request");
        }
        if !target.is_externally_driven() {
            let current = self.get_case(case_id)?;
            return Err(case_transition_error(&current.id, current.status, target));
        }

        let now = Utc::now();
        let (row, from) = self
            .store
            .cases()
            .mutate(case_id, None, |case| case.transition(target, "status update", now))?;
        self.case_event(&row.value, from, now);

        if target == CaseStatus::Resolved {
            if let Some(ambulance_id) = &row.value.assigned_ambulance_id {
                match self.engine.complete_transport(ambulance_id, &row.value.id, now) {
                    Ok(Some(previous)) => self.ambulance_event(ambulance_id, previous, AmbulanceStatus::Available, now),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(ambulance_id, error = %err, "could not return ambulance to service"),
                }
            }
        }
        Ok(row.value)
    }

    /// `* → cancelled`. Releases held beds and stands down an ambulance that has not reached
    /// the scene.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] if the case is already terminal.
    pub fn cancel(&self, case_id: &str, reason: &str) -> DispatchResult<EmergencyCase> {
        let now = Utc::now();
        let (row, from) = self
            .store
            .cases()
            .mutate(case_id, None, |case| case.transition(CaseStatus::Cancelled, reason, now))?;
        self.case_event(&row.value, from, now);

        self.release_and_publish(&row.value.bed_allocation_ids, now)?;
        if let Some(ambulance_id) = &row.value.assigned_ambulance_id {
            self.stand_down(ambulance_id, &row.value.id, now);
        }
        tracing::info!(case_id, reason, "case cancelled");
        Ok(row.value)
    }

    /// Re-attempts every case waiting on a bed or an ambulance, most severe first.
    pub async fn retry_pending(&self) -> PendingSweep {
        let mut waiting: Vec<EmergencyCase> = self
            .store
            .cases()
            .list(|c| matches!(c.status, CaseStatus::BedRequested | CaseStatus::BedAllocated))
            .into_iter()
            .map(|row| row.value)
            .collect();
        waiting.sort_by(|a, b| a.priority_key().cmp(&b.priority_key()));

        let mut sweep = PendingSweep::default();
        for case in waiting {
            sweep.attempted += 1;
            let case_id = case.id.to_string();
            let result = if case.status == CaseStatus::BedRequested {
                self.allocate(&case_id, AllocationDirective::default())
                    .await
                    .map(|_| ())
            } else {
                self.assign_ambulance(&case_id).await.map(|_| ())
            };
            match result {
                Ok(()) => sweep.advanced += 1,
                Err(err) if err.is_exhaustion() => sweep.waiting += 1,
                Err(err) => {
                    tracing::warn!(case_id, error = %err, "pending case retry failed");
                    sweep.failed += 1;
                }
            }
        }
        if sweep.attempted > 0 {
            tracing::info!(?sweep, "pending cases swept");
        }
        sweep
    }

    // ========================================================================
    // Hospital and ambulance updates
    // ========================================================================

    /// # Errors
    ///
    /// See [`AllocationEngine::update_capacity`].
    pub fn update_capacity(
        &self,
        hospital_id: &str,
        counts: &BTreeMap<BedType, BedCapacity>,
    ) -> DispatchResult<Hospital> {
        self.engine.update_capacity(hospital_id, counts, Utc::now())
    }

    /// Sets or clears a diversion, publishing a hospital event when its intake state changes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown hospital.
    pub fn set_diversion(&self, hospital_id: &str, diversion: Diversion) -> DispatchResult<Hospital> {
        let now = Utc::now();
        let before = self.store.hospitals().get(hospital_id)?.value;
        let (hospital, _) = self.engine.set_diversion(hospital_id, diversion, now)?;
        let (from, to) = (intake_state(&before, now), intake_state(&hospital, now));
        if from != to {
            self.emit(TransitionEvent::new(EntityKind::Hospital, hospital_id, from, to, now));
        }
        Ok(hospital)
    }

    /// Discharge: releases one bed allocation.
    ///
    /// # Errors
    ///
    /// See [`AllocationEngine::release_bed`].
    pub fn release_bed(
        &self,
        hospital_id: &str,
        allocation_id: &CanonicalId,
    ) -> DispatchResult<BedAllocation> {
        let now = Utc::now();
        let allocation = self.engine.release_bed(hospital_id, allocation_id, now)?;
        self.emit(TransitionEvent::new(
            EntityKind::BedAllocation,
            allocation.id.as_str(),
            BED_ACTIVE,
            BED_RELEASED,
            now,
        ));
        Ok(allocation)
    }

    /// # Errors
    ///
    /// See [`AllocationEngine::update_location`].
    pub fn update_ambulance_location(
        &self,
        ambulance_id: &str,
        location: GeoPoint,
        heading: Option<f64>,
        speed_kmh: Option<f64>,
    ) -> DispatchResult<Ambulance> {
        self.engine
            .update_location(ambulance_id, location, heading, speed_kmh, Utc::now())
    }

    /// # Errors
    ///
    /// See [`AllocationEngine::update_ambulance_status`].
    pub fn update_ambulance_status(
        &self,
        ambulance_id: &str,
        next: AmbulanceStatus,
    ) -> DispatchResult<Ambulance> {
        let now = Utc::now();
        let (ambulance, previous) = self.engine.update_ambulance_status(ambulance_id, next, now)?;
        self.ambulance_event(ambulance_id, previous, next, now);
        Ok(ambulance)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// `triaged → bed_requested`, tolerating a concurrent caller that got there first.
    fn request_bed(&self, case_id: &str) -> DispatchResult<()> {
        let now = Utc::now();
        let (row, from) = self.store.cases().mutate(case_id, None, |case| {
            if case.status == CaseStatus::BedRequested {
                return Ok(None);
            }
            case.transition(CaseStatus::BedRequested, "bed requested", now)
                .map(Some)
        })?;
        if let Some(from) = from {
            self.case_event(&row.value, from, now);
        }
        Ok(())
    }

    fn commit_assignment(&self, case_id: &str, ambulance_id: &str) -> DispatchResult<EmergencyCase> {
        let now = Utc::now();
        let (row, from) = self.store.cases().mutate(case_id, None, |case| {
            if case.status != CaseStatus::BedAllocated {
                return Err(case_transition_error(
                    &case.id,
                    case.status,
                    CaseStatus::AmbulanceAssigned,
                ));
            }
            case.assigned_ambulance_id = Some(ambulance_id.to_owned());
            case.transition(
                CaseStatus::AmbulanceAssigned,
                format!("ambulance {ambulance_id} assigned"),
                now,
            )
        })?;
        self.case_event(&row.value, from, now);
        Ok(row.value)
    }

    /// Undoes a bed allocation after a later step failed: `bed_allocated → bed_requested`.
    fn compensate_bed(&self, case_id: &str, reason: &str) -> DispatchResult<()> {
        let now = Utc::now();
        let (row, outcome) = self.store.cases().mutate(case_id, None, |case| {
            if case.status != CaseStatus::BedAllocated {
                return Ok(None);
            }
            let from = case.transition(
                CaseStatus::BedRequested,
                format!("rolled back: {reason}"),
                now,
            )?;
            case.assigned_hospital_id = None;
            Ok(Some((from, std::mem::take(&mut case.bed_allocation_ids))))
        })?;
        if let Some((from, beds)) = outcome {
            tracing::warn!(case_id, reason, "bed allocation rolled back");
            self.case_event(&row.value, from, now);
            self.release_and_publish(&beds, now)?;
        }
        Ok(())
    }

    fn existing_allocation(&self, case: &EmergencyCase) -> DispatchResult<Option<AllocationOutcome>> {
        if case.status.is_terminal() {
            return Err(case_transition_error(
                &case.id,
                case.status,
                CaseStatus::BedAllocated,
            ));
        }
        let Some(hospital_id) = &case.assigned_hospital_id else {
            return Ok(None);
        };
        let hospital = self.store.hospitals().get(hospital_id)?.value;
        let bed_type = match case.bed_allocation_ids.first() {
            Some(id) => self.store.allocations().get(id.as_str())?.value.bed_type,
            None => return Ok(None),
        };
        let distance_km = case.location.distance_km(&hospital.location);
        Ok(Some(AllocationOutcome {
            case: case.clone(),
            hospital_id: hospital.id,
            hospital_name: hospital.name,
            bed_type,
            allocation_ids: case.bed_allocation_ids.clone(),
            distance_km,
            eta_minutes: self.config().eta_minutes(distance_km),
            reused: true,
        }))
    }

    fn describe_assignment(
        &self,
        case: &EmergencyCase,
        ambulance_id: &str,
    ) -> DispatchResult<AmbulanceAssignment> {
        let ambulance = self.store.ambulances().get(ambulance_id)?.value;
        let distance_km = case.location.distance_km(&ambulance.location);
        Ok(AmbulanceAssignment {
            ambulance_id: ambulance.id,
            unit_number: ambulance.unit_number,
            capability_level: ambulance.capability_level,
            distance_km,
            eta_minutes: self.config().eta_minutes(distance_km),
        })
    }

    fn release_and_publish(&self, allocation_ids: &[CanonicalId], now: DateTime<Utc>) -> DispatchResult<()> {
        for allocation in self.engine.release_beds(allocation_ids, now)? {
            self.emit(TransitionEvent::new(
                EntityKind::BedAllocation,
                allocation.id.as_str(),
                BED_ACTIVE,
                BED_RELEASED,
                now,
            ));
        }
        Ok(())
    }

    fn stand_down(&self, ambulance_id: &str, case_id: &CanonicalId, now: DateTime<Utc>) {
        match self.engine.stand_down_ambulance(ambulance_id, case_id, now) {
            Ok(Some(previous)) => {
                self.ambulance_event(ambulance_id, previous, AmbulanceStatus::Available, now)
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(ambulance_id, error = %err, "could not stand down ambulance"),
        }
    }

    /// Records the exhaustion on the case (once per consecutive reason) and calls the hook.
    fn escalate(&self, case_id: &str, reason: Exhaustion) {
        let now = Utc::now();
        let detail = reason.to_string();
        let repeated = |case: &EmergencyCase| {
            case.timeline
                .last()
                .is_some_and(|e| e.event_type == EVENT_ESCALATED && e.detail == detail)
        };
        let recorded = match self.store.cases().get(case_id) {
            Ok(row) if repeated(&row.value) => Ok((row, ())),
            _ => self.store.cases().mutate(case_id, None, |case| {
                if !repeated(&*case) {
                    case.record(EVENT_ESCALATED, detail.as_str(), now);
                }
                Ok(())
            }),
        };
        match recorded {
            Ok((row, ())) => self.escalation.escalate(&row.value, reason),
            Err(err) => tracing::warn!(case_id, error = %err, "could not record escalation"),
        }
    }

    fn case_event(&self, case: &EmergencyCase, from: CaseStatus, at: DateTime<Utc>) {
        tracing::info!(case_id = %case.id, %from, to = %case.status, "case transition");
        self.emit(TransitionEvent::new(
            EntityKind::EmergencyCase,
            case.id.as_str(),
            from,
            case.status,
            at,
        ));
    }

    fn ambulance_event(
        &self,
        ambulance_id: &str,
        from: AmbulanceStatus,
        to: AmbulanceStatus,
        at: DateTime<Utc>,
    ) {
        self.emit(TransitionEvent::new(EntityKind::Ambulance, ambulance_id, from, to, at));
    }

    /// Best-effort publication; sink failures are logged and never fail the caller.
    fn emit(&self, event: TransitionEvent) {
        if let Err(err) = self.sink.publish(&event) {
            tracing::warn!(
                sink = self.sink.name(),
                entity_id = %event.entity_id,
                error = %err,
                "event publication failed"
            );
        }
    }
}

fn case_transition_error(id: &CanonicalId, from: CaseStatus, to: CaseStatus) -> DispatchError {
    DispatchError::invalid_transition(EntityKind::EmergencyCase, id.as_str(), from, to)
}

/// Intake state of a hospital as published in diversion events.
fn intake_state(hospital: &Hospital, now: DateTime<Utc>) -> &'static str {
    if hospital.diversion.blocks_all(now) {
        "diverted_full"
    } else if hospital.diversion.is_partial(now) {
        "diverted_partial"
    } else {
        "accepting"
    }
}
