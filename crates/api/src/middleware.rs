use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use warden_auth::TokenVerifier;
use warden_core::ServiceError;

use crate::app::errors::service_error_to_response;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Verify the bearer token and attach the resulting principal.
///
/// Every failure is a 401 carrying the error envelope.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(service_error_to_response)?;

    let principal = state.verifier.verify(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        service_error_to_response(ServiceError::from(e))
    })?;

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ServiceError::Unauthenticated)?;

    let header = header.to_str().map_err(|_| ServiceError::InvalidToken)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(ServiceError::Unauthenticated)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ServiceError::Unauthenticated);
    }

    Ok(token)
}
