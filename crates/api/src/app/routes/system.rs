use axum::{extract::Extension, http::StatusCode, Json};

use warden_auth::Principal;
use warden_core::Envelope;

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Echo the principal carried by the bearer token.
pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> Json<Envelope<Principal>> {
    Json(Envelope::with_data("Authenticated", principal.principal().clone()))
}
