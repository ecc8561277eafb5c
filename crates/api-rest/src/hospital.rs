//! `/hospital` routes: listings, bed availability, capacity, diversion and discharge.

use crate::convert::{allocation_dto, bed_availability, hospital_dto};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;
use api_shared::{
    BedAllocationDto, BedAvailabilityDto, BedAvailabilityQuery, CapacityReq, DiversionReq,
    HospitalDto, HospitalListQuery, HospitalListRes, ReleaseBedReq,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use healthguard_core::validation::{diversion_request, parse_capacity_counts};
use healthguard_core::{BedType, CanonicalId, DispatchError, TraumaLevel};
use std::str::FromStr;

#[utoipa::path(
    get,
    path = "/hospital",
    params(HospitalListQuery),
    responses(
        (status = 200, description = "Hospitals matching the filters", body = HospitalListRes),
        (status = 422, description = "Unknown level", body = api_shared::ErrorBody)
    )
)]
/// List hospitals, optionally filtered by trauma level, capability and free beds.
#[axum::debug_handler]
pub async fn list_hospitals(
    State(state): State<AppState>,
    Query(query): Query<HospitalListQuery>,
) -> ApiResult<Json<HospitalListRes>> {
    let level = query.level.as_deref().map(TraumaLevel::from_str).transpose()?;
    let now = Utc::now();
    let hospitals: Vec<HospitalDto> = state
        .coordinator
        .store()
        .hospitals()
        .list(|h| {
            level.map_or(true, |l| h.level == l)
                && query
                    .capability
                    .as_deref()
                    .map_or(true, |c| h.capabilities.contains(c))
                && query.min_available.map_or(true, |n| h.available_beds() >= u64::from(n))
        })
        .iter()
        .map(|row| hospital_dto(&row.value, now))
        .collect();
    Ok(Json(HospitalListRes {
        total: hospitals.len(),
        hospitals,
    }))
}

#[utoipa::path(
    get,
    path = "/hospital/beds",
    params(BedAvailabilityQuery),
    responses(
        (status = 200, description = "Per-hospital bed availability", body = [BedAvailabilityDto]),
        (status = 404, description = "Unknown hospital", body = api_shared::ErrorBody),
        (status = 422, description = "Unknown bed type", body = api_shared::ErrorBody)
    )
)]
/// Real-time bed availability with a per-type breakdown and utilisation percentage.
#[axum::debug_handler]
pub async fn bed_availability_report(
    State(state): State<AppState>,
    Query(query): Query<BedAvailabilityQuery>,
) -> ApiResult<Json<Vec<BedAvailabilityDto>>> {
    let bed_type = query.bed_type.as_deref().map(BedType::from_str).transpose()?;
    let hospitals = state.coordinator.store().hospitals();
    let rows = match query.hospital_id.as_deref() {
        Some(id) => vec![hospitals.get(id)?],
        None => hospitals.list(|_| true),
    };
    let now = Utc::now();
    Ok(Json(
        rows.iter()
            .map(|row| bed_availability(&row.value, bed_type, now))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/hospital/{id}",
    params(("id" = String, Path, description = "Hospital id")),
    responses(
        (status = 200, description = "Hospital detail", body = HospitalDto),
        (status = 404, description = "Unknown hospital", body = api_shared::ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_hospital(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<HospitalDto>> {
    let row = state.coordinator.store().hospitals().get(&id)?;
    Ok(Json(hospital_dto(&row.value, Utc::now())))
}

#[utoipa::path(
    put,
    path = "/hospital/{id}/capacity",
    params(("id" = String, Path, description = "Hospital id")),
    request_body = CapacityReq,
    responses(
        (status = 200, description = "Capacity updated", body = HospitalDto),
        (status = 404, description = "Unknown hospital", body = api_shared::ErrorBody),
        (status = 422, description = "Invalid counts (available > total, or below held beds)", body = api_shared::ErrorBody)
    )
)]
/// Replace bed counts for the named bed types.
#[axum::debug_handler]
pub async fn update_capacity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CapacityReq>,
) -> ApiResult<Json<HospitalDto>> {
    let counts = parse_capacity_counts(
        req.beds
            .iter()
            .map(|(bed_type, c)| (bed_type.as_str(), c.total, c.available)),
    )?;
    let hospital = state.coordinator.update_capacity(&id, &counts)?;
    Ok(Json(hospital_dto(&hospital, Utc::now())))
}

#[utoipa::path(
    put,
    path = "/hospital/{id}/diversion",
    params(("id" = String, Path, description = "Hospital id")),
    request_body = DiversionReq,
    responses(
        (status = 200, description = "Diversion set or cleared", body = HospitalDto),
        (status = 404, description = "Unknown hospital", body = api_shared::ErrorBody),
        (status = 422, description = "Invalid diversion", body = api_shared::ErrorBody)
    )
)]
/// Set or clear ambulance diversion.
#[axum::debug_handler]
pub async fn set_diversion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DiversionReq>,
) -> ApiResult<Json<HospitalDto>> {
    let now = Utc::now();
    let diversion = diversion_request(
        req.active,
        req.kind.as_deref(),
        req.reason,
        req.duration_hours,
        now,
    )?;
    let hospital = state.coordinator.set_diversion(&id, diversion)?;
    Ok(Json(hospital_dto(&hospital, now)))
}

#[utoipa::path(
    post,
    path = "/hospital/{id}/release-bed",
    params(("id" = String, Path, description = "Hospital id")),
    request_body = ReleaseBedReq,
    responses(
        (status = 200, description = "Allocation released", body = BedAllocationDto),
        (status = 404, description = "Unknown hospital or allocation", body = api_shared::ErrorBody),
        (status = 409, description = "Allocation already released", body = api_shared::ErrorBody)
    )
)]
/// Discharge: release one bed allocation back to the hospital.
#[axum::debug_handler]
pub async fn release_bed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReleaseBedReq>,
) -> ApiResult<Json<BedAllocationDto>> {
    let allocation_id = CanonicalId::parse(&req.allocation_id).map_err(DispatchError::from)?;
    let allocation = state.coordinator.release_bed(&id, &allocation_id)?;
    Ok(Json(allocation_dto(&allocation)))
}
