use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
};

use warden_auth::IssuedToken;
use warden_core::Envelope;

use crate::app::dto::{self, LoginRequest, RegisterRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<()>>), ApiError> {
    let registration = dto::json_body(payload)?.validate()?;
    let out = services.manager.register(registration).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<IssuedToken>>, ApiError> {
    let body = dto::json_body(payload)?;
    body.validate()?;
    let out = services.manager.login(&body.email, &body.password).await?;
    Ok(Json(out))
}
