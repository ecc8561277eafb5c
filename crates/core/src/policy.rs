//! Policy Guard: business-rule validation for bed allocation.
//!
//! [`PolicyGuard::check`] is a pure function of the request and the hospital's current state.
//! Rules are evaluated in a fixed order and the first violation wins:
//! 1. hospital not on full diversion
//! 2. bed count within the per-request ceiling
//! 3. every required capability present
//! 4. bed type compatible with the case severity

use crate::config::PolicyLimits;
use crate::models::{BedType, Hospital, Severity};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("hospital {hospital_id} is on full diversion")]
    HospitalOnDiversion { hospital_id: String },

    #[error("requested {requested} beds exceeds the per-request ceiling of {ceiling}")]
    BedCountExceeded { requested: u32, ceiling: u32 },

    #[error("hospital {hospital_id} lacks required capability '{capability}'")]
    MissingCapability {
        hospital_id: String,
        capability: String,
    },

    #[error("{severity} severity cannot be placed in a {bed_type} bed")]
    IncompatibleBedType {
        severity: Severity,
        bed_type: BedType,
    },
}

impl PolicyViolation {
    /// Stable name of the rule that failed.
    pub fn rule(&self) -> &'static str {
        match self {
            PolicyViolation::HospitalOnDiversion { .. } => "diversion",
            PolicyViolation::BedCountExceeded { .. } => "bed_ceiling",
            PolicyViolation::MissingCapability { .. } => "capability",
            PolicyViolation::IncompatibleBedType { .. } => "severity_bed_type",
        }
    }
}

/// Bed types acceptable for a severity, in order of preference.
pub fn compatible_bed_types(severity: Severity) -> &'static [BedType] {
    use BedType::*;

    match severity {
        Severity::Critical => &[Icu, Er],
        Severity::High => &[Icu, StepDown, Er, Telemetry],
        Severity::Medium => &[Er, Telemetry, StepDown, MedicalSurgical],
        Severity::Low => &[MedicalSurgical, Er, Telemetry],
    }
}

/// What an allocation attempt wants to commit.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'a> {
    pub severity: Severity,
    pub bed_type: BedType,
    pub bed_count: u32,
    pub required_capabilities: &'a BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct PolicyGuard {
    limits: PolicyLimits,
}

impl PolicyGuard {
    pub fn new(limits: PolicyLimits) -> Self {
        Self { limits }
    }

    /// The per-request ceiling on its own, for callers that have not picked a hospital yet.
    pub fn check_bed_count(&self, bed_count: u32) -> Result<(), PolicyViolation> {
        if bed_count > self.limits.max_beds_per_request {
            return Err(PolicyViolation::BedCountExceeded {
                requested: bed_count,
                ceiling: self.limits.max_beds_per_request,
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the first [`PolicyViolation`] in rule order.
    pub fn check(
        &self,
        request: &AllocationRequest<'_>,
        hospital: &Hospital,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation> {
        if hospital.diversion.blocks_all(now) {
            return Err(PolicyViolation::HospitalOnDiversion {
                hospital_id: hospital.id.clone(),
            });
        }

        self.check_bed_count(request.bed_count)?;

        if let Some(capability) = hospital.missing_capability(request.required_capabilities) {
            return Err(PolicyViolation::MissingCapability {
                hospital_id: hospital.id.clone(),
                capability: capability.to_owned(),
            });
        }

        if !compatible_bed_types(request.severity).contains(&request.bed_type) {
            return Err(PolicyViolation::IncompatibleBedType {
                severity: request.severity,
                bed_type: request.bed_type,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BedCapacity, Diversion, DiversionType, TraumaLevel};
    use healthguard_types::GeoPoint;

    fn guard() -> PolicyGuard {
        PolicyGuard::new(PolicyLimits {
            max_beds_per_request: 2,
        })
    }

    fn hospital(diverted: bool) -> Hospital {
        Hospital {
            id: "HOSP-001".into(),
            name: "Metro General".into(),
            level: TraumaLevel::Level1,
            capabilities: ["trauma_surgery".to_string()].into_iter().collect(),
            capacity: [(BedType::Icu, BedCapacity::new(4, 4).unwrap())]
                .into_iter()
                .collect(),
            diversion: Diversion {
                active: diverted,
                kind: DiversionType::Full,
                reason: None,
                expires_at: None,
            },
            location: GeoPoint::new(40.7, -74.0).unwrap(),
            last_updated: Utc::now(),
        }
    }

    fn caps(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_compatible_request() {
        let required = caps(&["trauma_surgery"]);
        let request = AllocationRequest {
            severity: Severity::Critical,
            bed_type: BedType::Icu,
            bed_count: 1,
            required_capabilities: &required,
        };
        assert_eq!(guard().check(&request, &hospital(false), Utc::now()), Ok(()));
    }

    #[test]
    fn diversion_is_reported_before_every_other_rule() {
        // Violates all four rules at once.
        let required = caps(&["burn_unit"]);
        let request = AllocationRequest {
            severity: Severity::Critical,
            bed_type: BedType::MedicalSurgical,
            bed_count: 10,
            required_capabilities: &required,
        };
        let err = guard().check(&request, &hospital(true), Utc::now()).unwrap_err();
        assert_eq!(err.rule(), "diversion");
    }

    #[test]
    fn bed_ceiling_is_reported_before_capability() {
        let required = caps(&["burn_unit"]);
        let request = AllocationRequest {
            severity: Severity::Critical,
            bed_type: BedType::MedicalSurgical,
            bed_count: 3,
            required_capabilities: &required,
        };
        let err = guard().check(&request, &hospital(false), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::BedCountExceeded {
                requested: 3,
                ceiling: 2
            }
        );
    }

    #[test]
    fn missing_capability_is_reported_before_bed_type() {
        let required = caps(&["burn_unit"]);
        let request = AllocationRequest {
            severity: Severity::Critical,
            bed_type: BedType::MedicalSurgical,
            bed_count: 1,
            required_capabilities: &required,
        };
        let err = guard().check(&request, &hospital(false), Utc::now()).unwrap_err();
        assert_eq!(err.rule(), "capability");
    }

    #[test]
    fn critical_never_goes_directly_to_medical_surgical() {
        let required = BTreeSet::new();
        let request = AllocationRequest {
            severity: Severity::Critical,
            bed_type: BedType::MedicalSurgical,
            bed_count: 1,
            required_capabilities: &required,
        };
        let err = guard().check(&request, &hospital(false), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::IncompatibleBedType {
                severity: Severity::Critical,
                bed_type: BedType::MedicalSurgical
            }
        );
    }

    #[test]
    fn critical_accepts_only_icu_or_er() {
        assert_eq!(
            compatible_bed_types(Severity::Critical),
            &[BedType::Icu, BedType::Er]
        );
    }
}
