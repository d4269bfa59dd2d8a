//! Engine tuning knobs.

use crate::condition::MAX_CONDITION_DEPTH;

/// Limits applied by [`ConfigService`](crate::ConfigService) and the
/// lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size used when `remove_matching` walks workflows and rules.
    pub removal_page_size: u32,
    /// Deepest condition nesting accepted on create/update.
    pub max_condition_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            removal_page_size: 100,
            max_condition_depth: MAX_CONDITION_DEPTH,
        }
    }
}
