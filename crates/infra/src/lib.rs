//! Infrastructure layer: identity store adapters and operation orchestration.

pub mod account_manager;
pub mod store;

pub use account_manager::{AccountManager, Registration, RoleDefinition};
pub use store::{IdentityStore, InMemoryIdentityStore, PostgresIdentityStore, StoreError};
