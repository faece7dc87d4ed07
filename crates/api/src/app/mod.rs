//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (store, token service, manager)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and boundary validation
//! - `errors.rs`: error kind to status mapping, envelope responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(router(services))
}

/// Router over already wired services.
pub fn router(services: services::AppServices) -> Router {
    let auth_state = middleware::AuthState {
        verifier: services.verifier.clone(),
    };
    let services = Arc::new(services);

    // Protected routes: require a verified bearer token.
    let protected = routes::protected_router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router().layer(Extension(services)))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
