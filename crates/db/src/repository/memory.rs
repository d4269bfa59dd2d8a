//! RwLock-backed in-memory table.
//!
//! Rows are kept in a `BTreeMap` keyed by id, so iteration order is ascending
//! id. Ids come from a monotonically increasing counter and are never handed
//! out twice, even after the row is deleted.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EntityStore;
use crate::{
    DbError, DbResult,
    models::{EntityId, Existing, Scope},
};

/// A stored payload together with the scope it was created under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow<E> {
    pub scope: Scope,
    pub entity: E,
}

/// Serializable image of a [`MemoryTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot<E> {
    pub next_id: EntityId,
    pub rows: BTreeMap<EntityId, StoredRow<E>>,
}

impl<E> Default for TableSnapshot<E> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

/// In-memory implementation of [`EntityStore`] for one entity kind.
#[derive(Debug)]
pub struct MemoryTable<E> {
    name: &'static str,
    state: RwLock<TableSnapshot<E>>,
}

impl<E> MemoryTable<E>
where
    E: Clone + Send + Sync,
{
    /// An empty table. `name` is used in error messages and logs.
    pub fn new(name: &'static str) -> Self {
        Self::from_snapshot(name, TableSnapshot::default())
    }

    /// Restore a table from a snapshot. The id counter is moved past the
    /// highest stored id if the snapshot's counter lags behind it.
    pub fn from_snapshot(name: &'static str, mut snapshot: TableSnapshot<E>) -> Self {
        if let Some(&last) = snapshot.rows.keys().next_back() {
            snapshot.next_id = snapshot.next_id.max(last + 1);
        }
        snapshot.next_id = snapshot.next_id.max(1);
        Self {
            name,
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> DbResult<TableSnapshot<E>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> DbResult<RwLockReadGuard<'_, TableSnapshot<E>>> {
        self.state.read().map_err(|_| DbError::Poisoned(self.name))
    }

    fn write(&self) -> DbResult<RwLockWriteGuard<'_, TableSnapshot<E>>> {
        self.state.write().map_err(|_| DbError::Poisoned(self.name))
    }

    fn not_found(&self, scope: &Scope, id: EntityId) -> DbError {
        DbError::NotFound {
            entity: self.name,
            id,
            scope: scope.clone(),
        }
    }
}

impl<E> EntityStore<E> for MemoryTable<E>
where
    E: Clone + Send + Sync,
{
    fn create(&self, scope: &Scope, entity: E) -> DbResult<Existing<E>> {
        let mut state = self.write()?;
        let id = state.next_id;
        state.next_id += 1;
        state.rows.insert(
            id,
            StoredRow {
                scope: scope.clone(),
                entity: entity.clone(),
            },
        );
        debug!("created {} {} under {}", self.name, id, scope);
        Ok(Existing::new(id, entity))
    }

    fn get(&self, scope: &Scope, id: EntityId) -> DbResult<Existing<E>> {
        let state = self.read()?;
        match state.rows.get(&id) {
            Some(row) if &row.scope == scope => Ok(Existing::new(id, row.entity.clone())),
            _ => Err(self.not_found(scope, id)),
        }
    }

    fn update(&self, scope: &Scope, id: EntityId, entity: E) -> DbResult<Existing<E>> {
        let mut state = self.write()?;
        match state.rows.get_mut(&id) {
            Some(row) if &row.scope == scope => {
                row.entity = entity.clone();
                Ok(Existing::new(id, entity))
            }
            _ => Err(self.not_found(scope, id)),
        }
    }

    fn delete(&self, scope: &Scope, id: EntityId) -> DbResult<()> {
        let mut state = self.write()?;
        if !matches!(state.rows.get(&id), Some(row) if &row.scope == scope) {
            return Err(self.not_found(scope, id));
        }
        state.rows.remove(&id);
        debug!("deleted {} {} under {}", self.name, id, scope);
        Ok(())
    }

    fn list(&self, scope: &Scope) -> DbResult<Vec<Existing<E>>> {
        let state = self.read()?;
        Ok(state
            .rows
            .iter()
            .filter(|(_, row)| &row.scope == scope)
            .map(|(id, row)| Existing::new(*id, row.entity.clone()))
            .collect())
    }

    fn count(&self, scope: &Scope) -> DbResult<usize> {
        let state = self.read()?;
        Ok(state.rows.values().filter(|row| &row.scope == scope).count())
    }

    fn list_window(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> DbResult<(Vec<Existing<E>>, usize)> {
        let state = self.read()?;
        let mut total = 0;
        let mut window = Vec::new();
        for (id, row) in state.rows.iter().filter(|(_, row)| &row.scope == scope) {
            if total >= offset && window.len() < limit {
                window.push(Existing::new(*id, row.entity.clone()));
            }
            total += 1;
        }
        Ok((window, total))
    }
}
