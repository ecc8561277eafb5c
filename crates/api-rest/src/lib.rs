//! # API REST
//!
//! REST API implementation for HealthGuard.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status-code mapping, CORS, request tracing)
//!
//! All domain behaviour lives in `healthguard-core`; handlers parse wire DTOs from `api-shared`,
//! call the [`DispatchCoordinator`] and map its results back. The binary that serves this
//! router is the workspace's `healthguard-run`.

#![warn(rust_2018_idioms)]

pub mod ambulance;
mod convert;
pub mod emergency;
pub mod error;
pub mod hospital;

use api_shared::HealthService;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, patch, post, put};
use axum::Router;
use healthguard_core::DispatchCoordinator;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server.
///
/// Shared by every handler; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<DispatchCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        emergency::create_emergency,
        emergency::active_emergencies,
        emergency::get_emergency,
        emergency::timeline,
        emergency::triage,
        emergency::allocate,
        emergency::dispatch,
        emergency::reroute,
        emergency::update_status,
        hospital::list_hospitals,
        hospital::bed_availability_report,
        hospital::get_hospital,
        hospital::update_capacity,
        hospital::set_diversion,
        hospital::release_bed,
        ambulance::active_ambulances,
        ambulance::nearest_ambulance,
        ambulance::get_ambulance,
        ambulance::update_location,
        ambulance::update_status,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorBody,
        api_shared::Coordinates,
        api_shared::CreateEmergencyReq,
        api_shared::CreateEmergencyRes,
        api_shared::EmergencyCaseDto,
        api_shared::EmergencyDetailRes,
        api_shared::ActiveEmergenciesRes,
        api_shared::TimelineEntryDto,
        api_shared::TimelineRes,
        api_shared::VitalSignsDto,
        api_shared::TriageReq,
        api_shared::TriageRes,
        api_shared::IndicatorDto,
        api_shared::AllocateReq,
        api_shared::AllocateRes,
        api_shared::DispatchRes,
        api_shared::StatusReq,
        api_shared::RerouteReq,
        api_shared::BedCountsDto,
        api_shared::DiversionDto,
        api_shared::HospitalDto,
        api_shared::HospitalListRes,
        api_shared::BedAvailabilityDto,
        api_shared::CapacityReq,
        api_shared::DiversionReq,
        api_shared::ReleaseBedReq,
        api_shared::BedAllocationDto,
        api_shared::AmbulanceDto,
        api_shared::ActiveAmbulancesRes,
        api_shared::LocationReq,
        api_shared::AmbulanceStatusReq,
        api_shared::NearestAmbulanceRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router: API routes, Swagger UI, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/emergency", post(emergency::create_emergency))
        .route("/emergency/active", get(emergency::active_emergencies))
        .route("/emergency/:id", get(emergency::get_emergency))
        .route("/emergency/:id/timeline", get(emergency::timeline))
        .route("/emergency/:id/triage", post(emergency::triage))
        .route("/emergency/:id/allocate", post(emergency::allocate))
        .route("/emergency/:id/dispatch", post(emergency::dispatch))
        .route("/emergency/:id/reroute", post(emergency::reroute))
        .route("/emergency/:id/status", patch(emergency::update_status))
        .route("/hospital", get(hospital::list_hospitals))
        .route("/hospital/beds", get(hospital::bed_availability_report))
        .route("/hospital/:id", get(hospital::get_hospital))
        .route("/hospital/:id/capacity", put(hospital::update_capacity))
        .route("/hospital/:id/diversion", put(hospital::set_diversion))
        .route("/hospital/:id/release-bed", post(hospital::release_bed))
        .route("/ambulance/active", get(ambulance::active_ambulances))
        .route("/ambulance/nearest", get(ambulance::nearest_ambulance))
        .route("/ambulance/:id", get(ambulance::get_ambulance))
        .route("/ambulance/:id/location", post(ambulance::update_location))
        .route("/ambulance/:id/status", patch(ambulance::update_status))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = api_shared::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<api_shared::HealthRes> {
    Json(HealthService::check_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use healthguard_core::events::{LoggingEscalation, MemorySink};
    use healthguard_core::seed::SeedData;
    use healthguard_core::{DispatchConfig, EntityStore};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemorySink>) {
        let store = Arc::new(EntityStore::new());
        SeedData::demo().unwrap().apply(&store).unwrap();
        let sink = Arc::new(MemorySink::new());
        let coordinator = DispatchCoordinator::new(
            store,
            DispatchConfig::default(),
            sink.clone(),
            Arc::new(LoggingEscalation),
        );
        (router(AppState::new(Arc::new(coordinator))), sink)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn open_case(app: &Router, severity: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/emergency",
            Some(json!({
                "patient_ref": "P12345",
                "type": "trauma",
                "location": {"lat": 40.7306, "lon": -73.9866},
                "severity": severity,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "intake");
        body["case_id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn full_dispatch_over_http() {
        let (app, sink) = app();
        let id = open_case(&app, "critical").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/emergency/{id}/triage"),
            Some(json!({"blood_pressure": "80/50", "symptoms": ["unresponsive"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["severity"], "critical");
        assert_eq!(body["required_ambulance_level"], "als");

        let (status, body) =
            send(&app, Method::POST, &format!("/emergency/{id}/allocate"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "bed_allocated");
        assert_eq!(body["bed_id"], body["allocation_ids"][0]);
        assert_eq!(body["reused"], false);

        let (status, again) =
            send(&app, Method::POST, &format!("/emergency/{id}/allocate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["bed_id"], body["bed_id"]);
        assert_eq!(again["reused"], true);

        let (status, body) =
            send(&app, Method::POST, &format!("/emergency/{id}/dispatch"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "ambulance_assigned");

        for target in ["en_route", "at_hospital", "resolved"] {
            let (status, body) = send(
                &app,
                Method::PATCH,
                &format!("/emergency/{id}/status"),
                Some(json!({"status": target})),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{target}: {body}");
            assert_eq!(body["status"], target);
        }

        let (status, body) =
            send(&app, Method::GET, &format!("/emergency/{id}/timeline"), None).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.first().unwrap()["event_type"], "created");
        assert_eq!(entries.last().unwrap()["event_type"], "resolved");
        assert!(!sink.events_for(&id).is_empty());
    }

    #[tokio::test]
    async fn invalid_intake_is_unprocessable() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/emergency",
            Some(json!({"patient_ref": "P1", "type": "trauma", "location": {"lat": 200.0, "lon": 0.0}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");

        let (status, body) = send(
            &app,
            Method::POST,
            "/emergency",
            Some(json!({"type": "trauma"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_body");
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/emergency/0123456789abcdef0123456789abcdef/triage",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn coordinator_driven_status_is_rejected() {
        let (app, _) = app();
        let id = open_case(&app, "high").await;
        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/emergency/{id}/status"),
            Some(json!({"status": "bed_allocated"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transition");
    }

    #[tokio::test]
    async fn allocate_before_triage_conflicts() {
        let (app, _) = app();
        let id = open_case(&app, "high").await;
        let (status, body) =
            send(&app, Method::POST, &format!("/emergency/{id}/allocate"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transition");
    }

    #[tokio::test]
    async fn bed_ceiling_reports_the_rule() {
        let (app, _) = app();
        let id = open_case(&app, "critical").await;
        send(&app, Method::POST, &format!("/emergency/{id}/triage"), Some(json!({}))).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/emergency/{id}/allocate"),
            Some(json!({"bed_count": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "policy_violation");
        assert_eq!(body["rule"], "bed_ceiling");
    }

    #[tokio::test]
    async fn capacity_update_validates_counts() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::PUT,
            "/hospital/HOSP-002/capacity",
            Some(json!({"beds": {"icu": {"total": 10, "available": 11}}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");

        let (status, body) = send(
            &app,
            Method::PUT,
            "/hospital/HOSP-002/capacity",
            Some(json!({"beds": {"icu": {"total": 32, "available": 10}}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["beds"]["icu"]["available"], 10);
        assert_eq!(body["beds"]["er"]["available"], 10);
    }

    #[tokio::test]
    async fn diversion_round_trip_shows_in_listing() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::PUT,
            "/hospital/HOSP-001/diversion",
            Some(json!({"active": true, "reason": "CT scanner down", "duration_hours": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diversion"]["in_effect"], true);
        assert_eq!(body["diversion"]["type"], "full");

        let (_, beds) = send(&app, Method::GET, "/hospital/beds?hospital_id=HOSP-001", None).await;
        assert_eq!(beds[0]["on_diversion"], true);
    }

    #[tokio::test]
    async fn absurd_diversion_duration_is_rejected() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::PUT,
            "/hospital/HOSP-001/diversion",
            Some(json!({"active": true, "duration_hours": 1e20})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn hospital_filters_and_bed_breakdown() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/hospital?level=level1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["hospitals"][0]["id"], "HOSP-001");

        let (_, body) = send(&app, Method::GET, "/hospital?capability=stroke_center", None).await;
        assert_eq!(body["total"], 2);

        let (status, body) = send(&app, Method::GET, "/hospital/beds?bed_type=icu", None).await;
        assert_eq!(status, StatusCode::OK);
        let hosp2 = body
            .as_array()
            .unwrap()
            .iter()
            .find(|h| h["hospital_id"] == "HOSP-002")
            .unwrap();
        assert_eq!(hosp2["total_beds"], 30);
        assert_eq!(hosp2["available_beds"], 8);

        let (status, _) = send(&app, Method::GET, "/hospital/NOPE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ambulance_location_and_nearest() {
        let (app, _) = app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/ambulance/AMB-999/location",
            Some(json!({"lat": 40.7, "lon": -74.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            Method::POST,
            "/ambulance/AMB-004/location",
            Some(json!({"lat": 40.7306, "lon": -73.9866, "heading": 90.0, "speed_kmh": 40.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["heading"], 90.0);

        let (status, body) = send(
            &app,
            Method::GET,
            "/ambulance/nearest?lat=40.7306&lon=-73.9866&level=als",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ambulance"]["id"], "AMB-003");
    }

    #[tokio::test]
    async fn ambulance_status_follows_its_table() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            Method::PATCH,
            "/ambulance/AMB-004/status",
            Some(json!({"status": "on_scene"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transition");

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/ambulance/AMB-004/status",
            Some(json!({"status": "out_of_service"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "out_of_service");

        let (_, active) = send(&app, Method::GET, "/ambulance/active", None).await;
        assert!(active["ambulances"]
            .as_array()
            .unwrap()
            .iter()
            .all(|a| a["id"] != "AMB-004"));
    }
}
