//! Mapping from domain errors to HTTP responses.

use api_shared::ErrorBody;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use healthguard_core::DispatchError;

/// JSON body extractor whose rejections use the same error body as domain failures.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                message: message.into(),
                rule: None,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match &err {
            DispatchError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            DispatchError::Validation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            DispatchError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "invalid_transition", message)
            }
            DispatchError::PolicyViolation(violation) => {
                let mut api = Self::new(StatusCode::CONFLICT, "policy_violation", message);
                api.body.rule = Some(violation.rule().to_owned());
                api
            }
            DispatchError::NoCapacity => Self::new(StatusCode::CONFLICT, "no_capacity", message),
            DispatchError::NoAmbulanceAvailable => {
                Self::new(StatusCode::CONFLICT, "no_ambulance_available", message)
            }
            DispatchError::AllocationFailed { .. } => {
                Self::new(StatusCode::CONFLICT, "allocation_failed", message)
            }
            DispatchError::Conflict { .. } => Self::new(StatusCode::CONFLICT, "conflict", message),
            DispatchError::Duplicate { .. } => Self::new(StatusCode::CONFLICT, "duplicate", message),
            DispatchError::InvalidConfig(_) | DispatchError::Seed(_) => {
                tracing::error!(error = %err, "internal error surfaced to API");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, "invalid_body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
