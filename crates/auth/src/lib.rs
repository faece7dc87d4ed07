//! `warden-auth`: credential and authorization engine.
//!
//! This crate is intentionally decoupled from HTTP and storage: it hashes and
//! verifies passwords, issues and verifies tokens, and makes pure allow/deny
//! decisions from the claims carried by a verified token.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{require_all_of, require_any_of, require_role, AuthzError};
pub use claims::{validate_claims, TokenClaims, TOKEN_TTL_SECS};
pub use password::{hash_password, verify_password, PasswordError, BCRYPT_COST};
pub use permissions::{deserialize_permissions, serialize_permissions, validate_permissions, Permission, PermissionError};
pub use policy::{authorize, policy_for, Operation, Policy};
pub use principal::Principal;
pub use roles::{NewRole, Role, RoleName, RoleSummary, ADMIN_ROLE, DEFAULT_ROLE};
pub use token::{Hs256TokenService, IssuedToken, TokenError, TokenVerifier};
pub use user::{normalize_email, NewUser, User, UserView};
