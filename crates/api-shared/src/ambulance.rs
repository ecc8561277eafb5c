use crate::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AmbulanceDto {
    pub id: String,
    pub unit_number: String,
    /// `available`, `dispatched`, `enroute`, `on_scene`, `transporting` or `out_of_service`.
    pub status: String,
    pub capability_level: String,
    pub location: Coordinates,
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub crew: Vec<String>,
    pub assigned_case_id: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActiveAmbulancesRes {
    pub ambulances: Vec<AmbulanceDto>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LocationReq {
    pub lat: f64,
    pub lon: f64,
    /// Degrees clockwise from north, `[0, 360)`.
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed_kmh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AmbulanceStatusReq {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearestAmbulanceQuery {
    pub lat: f64,
    pub lon: f64,
    /// Minimum capability level (`bls` or `als`); defaults to `bls`.
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NearestAmbulanceRes {
    pub ambulance: AmbulanceDto,
    pub distance_km: f64,
    pub estimated_eta_minutes: u32,
}
