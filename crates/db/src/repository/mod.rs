//! Repository contracts and their in-memory implementations.
//!
//! Every operation returns a `Result<T, DbError>`. No business logic: parent
//! existence, cascades and conflicts are enforced by the caller.

pub mod memory;
pub mod settings;

use crate::{
    DbResult,
    models::{EntityId, Existing, GlobalConfigRow, Scope, TenantConfigRow},
};

/// Store contract for one entity kind.
///
/// `list` must return rows in a stable order (ascending id, which is also
/// creation order) so that callers can page over the result.
pub trait EntityStore<E>: Send + Sync {
    /// Insert `entity` under `scope` and return it with its new id.
    fn create(&self, scope: &Scope, entity: E) -> DbResult<Existing<E>>;

    /// Fetch a row. A row stored under a different scope is `NotFound`.
    fn get(&self, scope: &Scope, id: EntityId) -> DbResult<Existing<E>>;

    /// Replace the stored payload wholesale.
    fn update(&self, scope: &Scope, id: EntityId, entity: E) -> DbResult<Existing<E>>;

    fn delete(&self, scope: &Scope, id: EntityId) -> DbResult<()>;

    /// All rows under `scope`, ascending by id.
    fn list(&self, scope: &Scope) -> DbResult<Vec<Existing<E>>>;

    /// Number of rows under `scope`.
    fn count(&self, scope: &Scope) -> DbResult<usize> {
        Ok(self.list(scope)?.len())
    }

    /// One window of `list`: `limit` rows starting at `offset`, plus the total
    /// row count under `scope`.
    fn list_window(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> DbResult<(Vec<Existing<E>>, usize)> {
        let rows = self.list(scope)?;
        let total = rows.len();
        let window = rows.into_iter().skip(offset).take(limit).collect();
        Ok((window, total))
    }
}

/// Store contract for global and tenant configuration entries.
pub trait SettingsStore: Send + Sync {
    /// Create or replace a global entry.
    fn set_global(&self, row: GlobalConfigRow) -> DbResult<()>;
    fn get_global(&self, key: &str) -> DbResult<GlobalConfigRow>;
    /// All global entries ordered by key.
    fn list_global(&self) -> DbResult<Vec<GlobalConfigRow>>;
    fn delete_global(&self, key: &str) -> DbResult<()>;

    /// Create or replace a tenant override.
    fn set_tenant(&self, row: TenantConfigRow) -> DbResult<()>;
    fn get_tenant(&self, tenant_id: &str, key: &str) -> DbResult<TenantConfigRow>;
    /// All overrides for a tenant ordered by key.
    fn list_tenant(&self, tenant_id: &str) -> DbResult<Vec<TenantConfigRow>>;
    fn delete_tenant(&self, tenant_id: &str, key: &str) -> DbResult<()>;
}
