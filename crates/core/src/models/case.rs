use super::CapabilityLevel;
use crate::error::{DispatchError, DispatchResult, EntityKind};
use crate::validation::CaseIntake;
use chrono::{DateTime, Utc};
use healthguard_types::{CanonicalId, GeoPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

wire_enum! {
    /// Clinical priority; `Critical` is highest.
    pub enum Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

wire_enum! {
    pub enum CaseStatus {
        Intake => "intake",
        Triaged => "triaged",
        BedRequested => "bed_requested",
        BedAllocated => "bed_allocated",
        AmbulanceAssigned => "ambulance_assigned",
        EnRoute => "en_route",
        AtHospital => "at_hospital",
        Resolved => "resolved",
        Cancelled => "cancelled",
    }
}

impl CaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Cancelled)
    }

    /// The case transition table.
    ///
    /// Forward edges follow the dispatch pipeline. `bed_allocated`, `ambulance_assigned` and
    /// `en_route` may return to `bed_requested` (explicit re-route). Every non-terminal state
    /// may be cancelled.
    pub fn can_transition_to(self, next: CaseStatus) -> bool {
        use CaseStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Intake, Triaged)
                | (Triaged, BedRequested)
                | (BedRequested, BedAllocated)
                | (BedAllocated, AmbulanceAssigned)
                | (AmbulanceAssigned, EnRoute)
                | (EnRoute, AtHospital)
                | (AtHospital, Resolved)
                | (BedAllocated | AmbulanceAssigned | EnRoute, BedRequested)
        )
    }

    /// Targets that callers may request directly; the rest are driven by the coordinator.
    pub fn is_externally_driven(self) -> bool {
        matches!(
            self,
            CaseStatus::EnRoute | CaseStatus::AtHospital | CaseStatus::Resolved | CaseStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyCase {
    pub id: CanonicalId,
    pub patient_ref: String,
    pub severity: Option<Severity>,
    pub confidence_score: Option<f64>,
    #[serde(rename = "type")]
    pub case_type: String,
    pub location: GeoPoint,
    pub status: CaseStatus,
    pub required_capabilities: BTreeSet<String>,
    pub required_ambulance_level: CapabilityLevel,
    pub assigned_ambulance_id: Option<String>,
    pub assigned_hospital_id: Option<String>,
    pub bed_allocation_ids: Vec<CanonicalId>,
    pub reporter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
}

impl EmergencyCase {
    /// Opens a new case in `intake` with a single `created` timeline entry.
    pub fn open(intake: CaseIntake, now: DateTime<Utc>) -> Self {
        let mut case = Self {
            id: CanonicalId::generate(),
            patient_ref: intake.patient_ref.into_inner(),
            severity: intake.reported_severity,
            confidence_score: None,
            case_type: intake.case_type.into_inner(),
            location: intake.location,
            status: CaseStatus::Intake,
            required_capabilities: BTreeSet::new(),
            required_ambulance_level: CapabilityLevel::Bls,
            assigned_ambulance_id: None,
            assigned_hospital_id: None,
            bed_allocation_ids: Vec::new(),
            reporter: intake.reporter,
            created_at: now,
            timeline: Vec::new(),
        };
        case.record("created", format!("case opened as {}", case.case_type), now);
        case
    }

    /// Appends a timeline entry and returns its index.
    pub fn record(&mut self, event_type: &str, detail: impl Into<String>, at: DateTime<Utc>) -> u64 {
        let index = self.timeline.len() as u64;
        self.timeline.push(TimelineEntry {
            index,
            timestamp: at,
            event_type: event_type.to_owned(),
            detail: detail.into(),
        });
        index
    }

    /// Moves to `next` if the edge is in the transition table, appending exactly one timeline
    /// entry. Returns the previous status.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidTransition`] if the edge is not in the table.
    pub fn transition(
        &mut self,
        next: CaseStatus,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DispatchResult<CaseStatus> {
        let from = self.status;
        if !from.can_transition_to(next) {
            return Err(DispatchError::invalid_transition(
                EntityKind::EmergencyCase,
                self.id.as_str(),
                from,
                next,
            ));
        }
        self.status = next;
        self.record(next.as_str(), detail, at);
        Ok(from)
    }

    /// Ordering key for active-case listings: most severe first, then oldest first.
    pub fn priority_key(&self) -> (std::cmp::Reverse<Option<Severity>>, DateTime<Utc>) {
        (std::cmp::Reverse(self.severity), self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::CaseStatus::*;
    use super::*;

    fn intake() -> CaseIntake {
        CaseIntake::new("P12345", "trauma", 40.7, -74.0, None, None).unwrap()
    }

    fn legal_edges() -> Vec<(CaseStatus, CaseStatus)> {
        let mut edges = vec![
            (Intake, Triaged),
            (Triaged, BedRequested),
            (BedRequested, BedAllocated),
            (BedAllocated, AmbulanceAssigned),
            (AmbulanceAssigned, EnRoute),
            (EnRoute, AtHospital),
            (AtHospital, Resolved),
            (BedAllocated, BedRequested),
            (AmbulanceAssigned, BedRequested),
            (EnRoute, BedRequested),
        ];
        for from in CaseStatus::ALL.iter().copied().filter(|s| !s.is_terminal()) {
            edges.push((from, Cancelled));
        }
        edges
    }

    #[test]
    fn transition_table_matches_every_pair() {
        let legal = legal_edges();
        for from in CaseStatus::ALL.iter().copied() {
            for to in CaseStatus::ALL.iter().copied() {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn legal_transition_appends_exactly_one_entry() {
        for (from, to) in legal_edges() {
            let mut case = EmergencyCase::open(intake(), Utc::now());
            case.status = from;
            let before = case.timeline.len();

            let previous = case.transition(to, "test", Utc::now()).unwrap();

            assert_eq!(previous, from);
            assert_eq!(case.status, to);
            assert_eq!(case.timeline.len(), before + 1);
            assert_eq!(case.timeline.last().unwrap().index, before as u64);
        }
    }

    #[test]
    fn illegal_transition_leaves_case_untouched() {
        let legal = legal_edges();
        for from in CaseStatus::ALL.iter().copied() {
            for to in CaseStatus::ALL.iter().copied() {
                if legal.contains(&(from, to)) {
                    continue;
                }
                let mut case = EmergencyCase::open(intake(), Utc::now());
                case.status = from;
                let snapshot = case.clone();

                let err = case.transition(to, "test", Utc::now()).unwrap_err();

                assert!(matches!(err, DispatchError::InvalidTransition { .. }));
                assert_eq!(case, snapshot);
            }
        }
    }

    #[test]
    fn severity_orders_critical_highest() {
        let mut severities = vec![Severity::High, Severity::Low, Severity::Critical];
        severities.sort();
        assert_eq!(severities.last(), Some(&Severity::Critical));
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn open_case_starts_in_intake_with_created_entry() {
        let case = EmergencyCase::open(intake(), Utc::now());
        assert_eq!(case.status, Intake);
        assert_eq!(case.timeline.len(), 1);
        assert_eq!(case.timeline[0].event_type, "created");
        assert!(case.assigned_hospital_id.is_none());
    }
}
