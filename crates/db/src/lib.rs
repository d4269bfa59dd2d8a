//! `db` crate: pure persistence layer.
//!
//! Provides the scoped store contracts the configuration core reads and writes
//! through, plus RwLock-backed in-memory implementations that can be
//! snapshotted to JSON. No business logic lives here.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{DbError, DbResult};
pub use models::{EntityId, Existing, Scope};
pub use repository::{EntityStore, SettingsStore};
