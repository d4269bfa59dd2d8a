//! Resolver-level error type.

use std::fmt;

use thiserror::Error;

/// What kind of name a resolver was asked to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    ActionType,
    ClassificationWorkflow,
    Expression,
    Tag,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionType => write!(f, "action type"),
            Self::ClassificationWorkflow => write!(f, "classification workflow"),
            Self::Expression => write!(f, "boilerplate expression"),
            Self::Tag => write!(f, "boilerplate tag"),
        }
    }
}

/// Errors returned by name resolvers and their backing sources.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The name is unknown even after refreshing from the backing source.
    #[error("unable to resolve {kind} '{name}'")]
    Unresolved { kind: ReferenceKind, name: String },

    /// The backing source could not be reached or answered with an error.
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid reference catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
