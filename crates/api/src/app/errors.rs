use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use warden_core::{Envelope, ErrorKind, ServiceError};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidCredentials
        | ErrorKind::Unauthenticated
        | ErrorKind::InvalidToken
        | ErrorKind::ExpiredToken => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    if err.kind() == ErrorKind::Internal {
        error!(error = %err, "request failed");
    }
    (status_for(err.kind()), Json(Envelope::failure(&err))).into_response()
}

/// Handler error: renders as the failure envelope with the mapped status.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        service_error_to_response(self.0)
    }
}
