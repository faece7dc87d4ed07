use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    http::StatusCode,
};

use warden_auth::UserView;
use warden_core::{Envelope, UserId};

use crate::app::dto::{self, AssignRoleRequest, PageQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// GET /users?page&limit (admin)
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<UserView>>>, ApiError> {
    let page = dto::page_query(query)?;
    let out = services.manager.list_users(principal.principal(), page).await?;
    Ok(Json(out))
}

/// POST /users/assign-role (admin)
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<()>>), ApiError> {
    let (user_id, role_id) = dto::json_body(payload)?.ids()?;
    let out = services
        .manager
        .assign_role(principal.principal(), user_id, role_id)
        .await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// DELETE /user/:id (admin)
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let target = UserId::from_str(&id)?;
    let out = services.manager.delete_user(principal.principal(), target).await?;
    Ok(Json(out))
}
