use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod auth;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/create/role", post(roles::create_role))
        .route("/roles", get(roles::list_roles))
        .route("/users", get(users::list_users))
        .route("/users/assign-role", post(users::assign_role))
        .route("/user/:id", delete(users::delete_user))
}
