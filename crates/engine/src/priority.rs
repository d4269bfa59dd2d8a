//! Priority assignment among the processing rules of one workflow.
//!
//! Within a workflow every rule has a distinct priority. A new rule that asks
//! for a taken priority gets it, and every rule at or above it moves up by
//! one. Deleting or updating a rule never renumbers its siblings, so gaps are
//! normal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use db::EntityId;

use crate::{EngineError, EngineResult};

/// Outcome of [`assign_priority`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityAssignment {
    /// Priority the new rule is created with.
    pub priority: i32,
    /// Existing rules that must be moved, as `(rule id, new priority)`,
    /// highest priority first.
    pub shifted: Vec<(EntityId, i32)>,
}

/// Decide the priority of a new rule given the `(id, priority)` pairs of the
/// rules already in the workflow.
///
/// * no request: one past the highest existing priority, or 1 for the first rule
/// * a free priority: used as-is
/// * a taken priority: used, and every rule with a priority `>=` it shifts up by one
pub fn assign_priority(
    existing: &[(EntityId, i32)],
    requested: Option<i32>,
) -> EngineResult<PriorityAssignment> {
    let Some(requested) = requested else {
        let priority = match existing.iter().map(|(_, priority)| *priority).max() {
            Some(max) => max.checked_add(1).ok_or_else(|| overflow(max))?,
            None => 1,
        };
        return Ok(PriorityAssignment {
            priority,
            shifted: Vec::new(),
        });
    };

    if !existing.iter().any(|(_, priority)| *priority == requested) {
        return Ok(PriorityAssignment {
            priority: requested,
            shifted: Vec::new(),
        });
    }

    let mut shifted = existing
        .iter()
        .filter(|(_, priority)| *priority >= requested)
        .map(|(id, priority)| {
            priority
                .checked_add(1)
                .map(|next| (*id, next))
                .ok_or_else(|| overflow(*priority))
        })
        .collect::<EngineResult<Vec<_>>>()?;
    shifted.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(PriorityAssignment {
        priority: requested,
        shifted,
    })
}

fn overflow(priority: i32) -> EngineError {
    EngineError::Validation(format!("no priority left above {priority}"))
}

/// Serializes priority read-modify-write cycles per workflow.
///
/// Rule creation on two different workflows proceeds in parallel; on the same
/// workflow the second caller waits for the first to finish shifting.
#[derive(Debug, Default)]
pub struct PriorityAllocator {
    locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl PriorityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock of `workflow_id`.
    pub fn with_workflow_lock<T>(&self, workflow_id: EntityId, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(workflow_id).or_default())
        };
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
