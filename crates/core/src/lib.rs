//! `warden-core`: identity/RBAC building blocks shared by every layer.
//!
//! This crate contains **pure** primitives (no IO, no framework types).

pub mod envelope;
pub mod error;
pub mod id;
pub mod pagination;

pub use envelope::Envelope;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use id::{RoleId, UserId};
pub use pagination::{PageMeta, PageRequest, Paginated};
