//! Identity persistence: users, roles and their many-to-many relation.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
pub use r#trait::{IdentityStore, StoreError};
