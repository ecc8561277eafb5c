use crate::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Intake
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateEmergencyReq {
    pub patient_ref: String,
    /// Free-form case type, e.g. `trauma`, `cardiac`, `stroke`.
    #[serde(rename = "type")]
    pub case_type: String,
    pub location: Coordinates,
    /// Severity reported by the caller; triage never lowers it.
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateEmergencyRes {
    pub case_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Case views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmergencyCaseDto {
    pub id: String,
    pub patient_ref: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub status: String,
    pub severity: Option<String>,
    pub confidence_score: Option<f64>,
    pub location: Coordinates,
    pub required_capabilities: Vec<String>,
    pub required_ambulance_level: String,
    pub assigned_hospital_id: Option<String>,
    pub assigned_ambulance_id: Option<String>,
    pub bed_allocation_ids: Vec<String>,
    pub reporter: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineEntryDto {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmergencyDetailRes {
    pub case: EmergencyCaseDto,
    pub timeline: Vec<TimelineEntryDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActiveEmergenciesRes {
    pub active_cases: Vec<EmergencyCaseDto>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineRes {
    pub case_id: String,
    pub entries: Vec<TimelineEntryDto>,
}

// ============================================================================
// Triage
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VitalSignsDto {
    pub heart_rate: Option<u32>,
    pub systolic_bp: Option<u32>,
    pub diastolic_bp: Option<u32>,
    pub respiratory_rate: Option<u32>,
    pub spo2: Option<f64>,
    pub temperature_c: Option<f64>,
    pub gcs: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TriageReq {
    #[serde(default)]
    pub vital_signs: VitalSignsDto,
    /// Combined reading such as `"180/110"`; fills systolic/diastolic when they are absent.
    #[serde(default)]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IndicatorDto {
    pub name: String,
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TriageRes {
    pub case_id: String,
    pub status: String,
    /// Final case severity (the worse of reported and assessed).
    pub severity: String,
    /// Severity produced by the scoring rules alone.
    pub assessed_severity: String,
    pub confidence_score: f64,
    pub score: u32,
    pub indicators: Vec<IndicatorDto>,
    pub required_capabilities: Vec<String>,
    pub required_ambulance_level: String,
}

// ============================================================================
// Allocation and dispatch
// ============================================================================

/// Optional body for `POST /emergency/{id}/allocate`. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AllocateReq {
    #[serde(default)]
    pub hospital_id: Option<String>,
    #[serde(default)]
    pub bed_type: Option<String>,
    #[serde(default)]
    pub bed_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AllocateRes {
    pub case_id: String,
    pub status: String,
    pub hospital_id: String,
    pub hospital_name: String,
    pub bed_type: String,
    /// First held allocation; equal to `allocation_ids[0]`.
    pub bed_id: String,
    pub allocation_ids: Vec<String>,
    pub distance_km: f64,
    pub estimated_eta_minutes: u32,
    /// True when the case already held this allocation and nothing new was reserved.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DispatchRes {
    pub case_id: String,
    pub status: String,
    pub ambulance_id: String,
    pub unit_number: String,
    pub capability_level: String,
    pub distance_km: f64,
    pub estimated_eta_minutes: u32,
    pub reused: bool,
}

// ============================================================================
// Status changes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct StatusReq {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RerouteReq {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_type_on_the_wire() {
        let req: CreateEmergencyReq = serde_json::from_str(
            r#"{"patient_ref":"P1","type":"trauma","location":{"lat":40.7,"lon":-74.0}}"#,
        )
        .unwrap();
        assert_eq!(req.case_type, "trauma");
        assert!(req.severity.is_none());
    }

    #[test]
    fn triage_request_rejects_unknown_vitals() {
        let err = serde_json::from_str::<TriageReq>(r#"{"vital_signs":{"pulse":120}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn empty_allocate_body_is_all_defaults() {
        let req: AllocateReq = serde_json::from_str("{}").unwrap();
        assert_eq!(req, AllocateReq::default());
    }
}
