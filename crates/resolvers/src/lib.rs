//! `resolvers` crate: name -> id lookups for references held in workflow
//! definitions.
//!
//! Each resolver is an explicit object owning a per-project cache and a
//! handle to its backing source. A miss triggers one refresh from the source;
//! a name that is still unknown afterwards is [`ResolverError::Unresolved`],
//! while a source that cannot be refreshed fails the lookup with its own error.

mod cache;

pub mod action_type;
pub mod boilerplate;
pub mod catalog;
pub mod classification;
pub mod error;
pub mod mock;
pub mod traits;

pub use action_type::ActionTypeNameResolver;
pub use boilerplate::BoilerplateNameResolver;
pub use catalog::ReferenceCatalog;
pub use classification::ClassificationWorkflowNameResolver;
pub use error::{ReferenceKind, ResolverError};
pub use traits::{
    ActionTypeCatalog, ActionTypeEntry, BoilerplateSource, ClassificationWorkflowSource, NamedId,
};
