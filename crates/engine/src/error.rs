//! Engine-level error types.

use thiserror::Error;

use db::DbError;
use resolvers::{ReferenceKind, ResolverError};

use crate::condition::ConditionError;

/// Errors produced by the configuration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Caller errors ------

    /// The id is unknown, or belongs to a different parent than the one given.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request contradicts the current state (e.g. deleting a workflow
    /// that still owns rules).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A condition's `additional` payload does not fit its `type`.
    #[error("malformed condition: {0}")]
    MalformedCondition(ConditionError),

    /// A referenced name is unknown even after refreshing the resolver.
    #[error("unable to resolve {kind} '{name}'")]
    UnresolvedReference { kind: ReferenceKind, name: String },

    /// A field is missing, too long or out of range.
    #[error("validation failed: {0}")]
    Validation(String),

    // ------ Collaborator errors ------

    /// Persistence failure other than not-found/conflict.
    #[error("store error: {0}")]
    Store(#[source] DbError),

    /// A resolver's backing source failed.
    #[error("resolver error: {0}")]
    Resolver(#[source] ResolverError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } | DbError::MissingKey(_) => Self::NotFound(err.to_string()),
            DbError::Conflict(message) => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}

impl From<ResolverError> for EngineError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::Unresolved { kind, name } => Self::UnresolvedReference { kind, name },
            other => Self::Resolver(other),
        }
    }
}

impl From<ConditionError> for EngineError {
    fn from(err: ConditionError) -> Self {
        match err {
            // A missing discriminator is a plain validation failure; every
            // other condition problem is a kind/field mismatch.
            ConditionError::MissingType { .. } => Self::Validation(err.to_string()),
            other => Self::MalformedCondition(other),
        }
    }
}
