//! `/ambulance` routes.

use crate::convert::ambulance_dto;
use crate::error::{ApiJson, ApiResult};
use crate::AppState;
use api_shared::{
    ActiveAmbulancesRes, AmbulanceDto, AmbulanceStatusReq, LocationReq, NearestAmbulanceQuery,
    NearestAmbulanceRes,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use healthguard_core::{AmbulanceStatus, CapabilityLevel, DispatchError, GeoPoint};
use std::str::FromStr;

#[utoipa::path(
    get,
    path = "/ambulance/active",
    responses(
        (status = 200, description = "Units not out of service", body = ActiveAmbulancesRes)
    )
)]
#[axum::debug_handler]
pub async fn active_ambulances(State(state): State<AppState>) -> Json<ActiveAmbulancesRes> {
    let ambulances = state
        .coordinator
        .store()
        .ambulances()
        .list(|a| a.status != AmbulanceStatus::OutOfService)
        .iter()
        .map(|row| ambulance_dto(&row.value))
        .collect();
    Json(ActiveAmbulancesRes {
        ambulances,
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/ambulance/nearest",
    params(NearestAmbulanceQuery),
    responses(
        (status = 200, description = "Nearest available unit", body = NearestAmbulanceRes),
        (status = 409, description = "No unit available at the requested level", body = api_shared::ErrorBody),
        (status = 422, description = "Invalid coordinates or level", body = api_shared::ErrorBody)
    )
)]
/// Read-only lookup of the closest available unit at or above a capability level.
#[axum::debug_handler]
pub async fn nearest_ambulance(
    State(state): State<AppState>,
    Query(query): Query<NearestAmbulanceQuery>,
) -> ApiResult<Json<NearestAmbulanceRes>> {
    let origin = GeoPoint::new(query.lat, query.lon).map_err(DispatchError::from)?;
    let level = query
        .level
        .as_deref()
        .map(CapabilityLevel::from_str)
        .transpose()?
        .unwrap_or(CapabilityLevel::Bls);
    let nearest = state
        .coordinator
        .engine()
        .nearest_available(origin, level)
        .ok_or(DispatchError::NoAmbulanceAvailable)?;
    Ok(Json(NearestAmbulanceRes {
        ambulance: ambulance_dto(&nearest.ambulance.value),
        distance_km: nearest.distance_km,
        estimated_eta_minutes: nearest.eta_minutes,
    }))
}

#[utoipa::path(
    get,
    path = "/ambulance/{id}",
    params(("id" = String, Path, description = "Ambulance id")),
    responses(
        (status = 200, description = "Ambulance detail", body = AmbulanceDto),
        (status = 404, description = "Unknown ambulance", body = api_shared::ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_ambulance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AmbulanceDto>> {
    let row = state.coordinator.store().ambulances().get(&id)?;
    Ok(Json(ambulance_dto(&row.value)))
}

#[utoipa::path(
    post,
    path = "/ambulance/{id}/location",
    params(("id" = String, Path, description = "Ambulance id")),
    request_body = LocationReq,
    responses(
        (status = 200, description = "Position recorded", body = AmbulanceDto),
        (status = 404, description = "Unknown ambulance", body = api_shared::ErrorBody),
        (status = 422, description = "Invalid position, heading or speed", body = api_shared::ErrorBody)
    )
)]
/// Record a GPS fix.
#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<LocationReq>,
) -> ApiResult<Json<AmbulanceDto>> {
    let location = GeoPoint::new(req.lat, req.lon).map_err(DispatchError::from)?;
    let ambulance =
        state
            .coordinator
            .update_ambulance_location(&id, location, req.heading, req.speed_kmh)?;
    Ok(Json(ambulance_dto(&ambulance)))
}

#[utoipa::path(
    patch,
    path = "/ambulance/{id}/status",
    params(("id" = String, Path, description = "Ambulance id")),
    request_body = AmbulanceStatusReq,
    responses(
        (status = 200, description = "Status changed", body = AmbulanceDto),
        (status = 404, description = "Unknown ambulance", body = api_shared::ErrorBody),
        (status = 409, description = "Invalid transition", body = api_shared::ErrorBody),
        (status = 422, description = "Unknown status", body = api_shared::ErrorBody)
    )
)]
/// Move a unit through its service cycle.
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AmbulanceStatusReq>,
) -> ApiResult<Json<AmbulanceDto>> {
    let next = AmbulanceStatus::from_str(&req.status)?;
    let ambulance = state.coordinator.update_ambulance_status(&id, next)?;
    Ok(Json(ambulance_dto(&ambulance)))
}
