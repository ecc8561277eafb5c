use crate::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BedCountsDto {
    pub total: u32,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiversionDto {
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the diversion currently applies (active and not expired).
    pub in_effect: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HospitalDto {
    pub id: String,
    pub name: String,
    pub level: String,
    pub capabilities: Vec<String>,
    pub location: Coordinates,
    pub beds: BTreeMap<String, BedCountsDto>,
    pub diversion: DiversionDto,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HospitalListRes {
    pub hospitals: Vec<HospitalDto>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HospitalListQuery {
    /// Trauma level, e.g. `level1`.
    pub level: Option<String>,
    /// Only hospitals offering this capability.
    pub capability: Option<String>,
    /// Only hospitals with at least this many available beds across all types.
    pub min_available: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BedAvailabilityQuery {
    pub hospital_id: Option<String>,
    /// Restrict the breakdown to one bed type.
    pub bed_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BedAvailabilityDto {
    pub hospital_id: String,
    pub hospital_name: String,
    pub total_beds: u64,
    pub available_beds: u64,
    pub bed_type_breakdown: BTreeMap<String, BedCountsDto>,
    pub utilization_percentage: f64,
    pub on_diversion: bool,
    pub last_updated: DateTime<Utc>,
}

/// Replacement counts per bed type. Types not named keep their current counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CapacityReq {
    pub beds: BTreeMap<String, BedCountsDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DiversionReq {
    pub active: bool,
    /// `full` or `partial`; defaults to `full`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Diversion lapses automatically after this many hours.
    #[serde(default)]
    pub duration_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReleaseBedReq {
    pub allocation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BedAllocationDto {
    pub id: String,
    pub hospital_id: String,
    pub bed_type: String,
    pub case_id: String,
    pub allocated_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}
