//! `/emergency` routes: case intake, triage, allocation, dispatch and status changes.

use crate::convert::{case_dto, timeline_dto};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;
use api_shared::{
    ActiveEmergenciesRes, AllocateReq, AllocateRes, CreateEmergencyReq, CreateEmergencyRes,
    DispatchRes, EmergencyCaseDto, EmergencyDetailRes, IndicatorDto, RerouteReq, StatusReq,
    TimelineRes, TriageReq, TriageRes,
};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use healthguard_core::coordinator::AllocationDirective;
use healthguard_core::triage::{TriageInput, VitalSigns};
use healthguard_core::validation::CaseIntake;
use healthguard_core::{BedType, CaseStatus, DispatchError};
use std::str::FromStr;

#[utoipa::path(
    post,
    path = "/emergency",
    request_body = CreateEmergencyReq,
    responses(
        (status = 201, description = "Case opened in intake", body = CreateEmergencyRes),
        (status = 422, description = "Invalid intake fields", body = api_shared::ErrorBody)
    )
)]
/// Open a new emergency case.
#[axum::debug_handler]
pub async fn create_emergency(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateEmergencyReq>,
) -> ApiResult<(StatusCode, Json<CreateEmergencyRes>)> {
    let intake = CaseIntake::new(
        &req.patient_ref,
        &req.case_type,
        req.location.lat,
        req.location.lon,
        req.severity.as_deref(),
        req.reporter,
    )?;
    let case = state.coordinator.create_case(intake)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateEmergencyRes {
            case_id: case.id.to_string(),
            status: case.status.to_string(),
            created_at: case.created_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/emergency/active",
    responses(
        (status = 200, description = "Non-terminal cases, most severe first", body = ActiveEmergenciesRes)
    )
)]
/// List active emergency cases.
#[axum::debug_handler]
pub async fn active_emergencies(State(state): State<AppState>) -> Json<ActiveEmergenciesRes> {
    let active_cases = state
        .coordinator
        .active_cases()
        .iter()
        .map(case_dto)
        .collect();
    Json(ActiveEmergenciesRes {
        active_cases,
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/emergency/{id}",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case with timeline", body = EmergencyDetailRes),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody)
    )
)]
/// Fetch one case including its timeline.
#[axum::debug_handler]
pub async fn get_emergency(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EmergencyDetailRes>> {
    let case = state.coordinator.get_case(&id)?;
    Ok(Json(EmergencyDetailRes {
        timeline: timeline_dto(&case.timeline),
        case: case_dto(&case),
    }))
}

#[utoipa::path(
    get,
    path = "/emergency/{id}/timeline",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Timeline entries in order", body = TimelineRes),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimelineRes>> {
    let entries = state.coordinator.timeline(&id)?;
    Ok(Json(TimelineRes {
        case_id: id,
        entries: timeline_dto(&entries),
    }))
}

#[utoipa::path(
    post,
    path = "/emergency/{id}/triage",
    params(("id" = String, Path, description = "Case id")),
    request_body = TriageReq,
    responses(
        (status = 200, description = "Case triaged", body = TriageRes),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody),
        (status = 409, description = "Case already triaged", body = api_shared::ErrorBody),
        (status = 422, description = "Invalid vital signs", body = api_shared::ErrorBody)
    )
)]
/// Score vital signs and symptoms and move the case to `triaged`.
#[axum::debug_handler]
pub async fn triage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<TriageReq>,
) -> ApiResult<Json<TriageRes>> {
    let v = req.vital_signs;
    let mut vitals = VitalSigns {
        heart_rate: v.heart_rate,
        systolic_bp: v.systolic_bp,
        diastolic_bp: v.diastolic_bp,
        respiratory_rate: v.respiratory_rate,
        spo2: v.spo2,
        temperature_c: v.temperature_c,
        gcs: v.gcs,
    };
    if let Some(raw) = req.blood_pressure.as_deref() {
        vitals.merge_blood_pressure(raw)?;
    }
    let input = TriageInput {
        vitals,
        symptoms: req.symptoms,
        age: req.age,
        history: req.history,
        case_type: String::new(),
    };

    let outcome = state.coordinator.triage(&id, input)?;
    let severity = outcome
        .case
        .severity
        .unwrap_or(outcome.assessment.severity);
    Ok(Json(TriageRes {
        case_id: outcome.case.id.to_string(),
        status: outcome.case.status.to_string(),
        severity: severity.to_string(),
        assessed_severity: outcome.assessment.severity.to_string(),
        confidence_score: outcome.assessment.confidence_score,
        score: outcome.assessment.score,
        indicators: outcome
            .assessment
            .indicators
            .iter()
            .map(|i| IndicatorDto {
                name: i.name.clone(),
                severity: i.severity.to_string(),
            })
            .collect(),
        required_capabilities: outcome.case.required_capabilities.iter().cloned().collect(),
        required_ambulance_level: outcome.case.required_ambulance_level.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/emergency/{id}/allocate",
    params(("id" = String, Path, description = "Case id")),
    request_body(content = AllocateReq, description = "Optional directed allocation"),
    responses(
        (status = 200, description = "Bed allocated", body = AllocateRes),
        (status = 404, description = "Unknown case or hospital", body = api_shared::ErrorBody),
        (status = 409, description = "No capacity, policy violation or invalid transition", body = api_shared::ErrorBody)
    )
)]
/// Reserve a bed for a triaged case.
///
/// The body is optional. Without it the engine picks the best-scoring hospital; with it the
/// allocation is directed to the named hospital and/or bed type, still subject to policy.
/// Repeating the call for a case that already holds a bed returns the existing allocation.
#[axum::debug_handler]
pub async fn allocate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AllocateRes>> {
    let req: AllocateReq = if body.iter().all(u8::is_ascii_whitespace) {
        AllocateReq::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| DispatchError::Validation(format!("invalid allocate body: {e}")))?
    };
    let directive = AllocationDirective {
        hospital_id: req.hospital_id,
        bed_type: req.bed_type.as_deref().map(BedType::from_str).transpose()?,
        bed_count: req.bed_count,
    };

    let outcome = state.coordinator.allocate(&id, directive).await?;
    let bed_id = outcome
        .allocation_ids
        .first()
        .map(|a| a.to_string())
        .unwrap_or_default();
    Ok(Json(AllocateRes {
        case_id: outcome.case.id.to_string(),
        status: outcome.case.status.to_string(),
        hospital_id: outcome.hospital_id,
        hospital_name: outcome.hospital_name,
        bed_type: outcome.bed_type.to_string(),
        bed_id,
        allocation_ids: outcome.allocation_ids.iter().map(|a| a.to_string()).collect(),
        distance_km: outcome.distance_km,
        estimated_eta_minutes: outcome.eta_minutes,
        reused: outcome.reused,
    }))
}

#[utoipa::path(
    post,
    path = "/emergency/{id}/dispatch",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Ambulance assigned", body = DispatchRes),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody),
        (status = 409, description = "No ambulance available or invalid transition", body = api_shared::ErrorBody)
    )
)]
/// Assign the nearest capable ambulance to a case holding a bed.
#[axum::debug_handler]
pub async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DispatchRes>> {
    let outcome = state.coordinator.assign_ambulance(&id).await?;
    let a = outcome.assignment;
    Ok(Json(DispatchRes {
        case_id: outcome.case.id.to_string(),
        status: outcome.case.status.to_string(),
        ambulance_id: a.ambulance_id,
        unit_number: a.unit_number,
        capability_level: a.capability_level.to_string(),
        distance_km: a.distance_km,
        estimated_eta_minutes: a.eta_minutes,
        reused: outcome.reused,
    }))
}

#[utoipa::path(
    post,
    path = "/emergency/{id}/reroute",
    params(("id" = String, Path, description = "Case id")),
    request_body = RerouteReq,
    responses(
        (status = 200, description = "Case returned to bed_requested", body = EmergencyCaseDto),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody),
        (status = 409, description = "Case cannot be re-routed from its state", body = api_shared::ErrorBody)
    )
)]
/// Release the held bed and send the case back for a new allocation.
#[axum::debug_handler]
pub async fn reroute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RerouteReq>,
) -> ApiResult<Json<EmergencyCaseDto>> {
    let case = state.coordinator.reroute(&id, &req.reason)?;
    Ok(Json(case_dto(&case)))
}

#[utoipa::path(
    patch,
    path = "/emergency/{id}/status",
    params(("id" = String, Path, description = "Case id")),
    request_body = StatusReq,
    responses(
        (status = 200, description = "Status changed", body = EmergencyCaseDto),
        (status = 404, description = "Unknown case", body = api_shared::ErrorBody),
        (status = 409, description = "Invalid transition", body = api_shared::ErrorBody),
        (status = 422, description = "Unknown status", body = api_shared::ErrorBody)
    )
)]
/// Drive an externally observed transition: `en_route`, `at_hospital`, `resolved` or
/// `cancelled`.
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusReq>,
) -> ApiResult<Json<EmergencyCaseDto>> {
    let target = CaseStatus::from_str(&req.status)?;
    let case = match (target, req.reason.as_deref()) {
        (CaseStatus::Cancelled, Some(reason)) => state.coordinator.cancel(&id, reason),
        _ => state.coordinator.update_status(&id, target),
    }
    .map_err(ApiError::from)?;
    Ok(Json(case_dto(&case)))
}
