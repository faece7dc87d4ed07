use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Json, Query,
    },
    http::StatusCode,
};

use warden_auth::Role;
use warden_core::Envelope;

use crate::app::dto::{self, CreateRoleRequest, PageQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// POST /auth/create/role (admin)
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<CreateRoleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Role>>), ApiError> {
    let body = dto::json_body(payload)?;
    let out = services
        .manager
        .create_role(principal.principal(), body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// GET /roles?page&limit (admin)
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Role>>>, ApiError> {
    let page = dto::page_query(query)?;
    let out = services.manager.list_roles(principal.principal(), page).await?;
    Ok(Json(out))
}
