//! Typed error type for the db crate.

use thiserror::Error;

use crate::models::{EntityId, Scope};

#[derive(Debug, Error)]
pub enum DbError {
    /// No row with this id exists under the given scope. A row that exists under
    /// a different scope is reported the same way.
    #[error("{entity} {id} not found under {scope}")]
    NotFound {
        entity: &'static str,
        id: EntityId,
        scope: Scope,
    },

    /// Keyed row (settings) not found.
    #[error("{0}")]
    MissingKey(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A writer panicked while holding a table lock.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;
