//! In-memory global/tenant configuration store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::SettingsStore;
use crate::{
    DbError, DbResult,
    models::{GlobalConfigRow, TenantConfigRow},
};

/// Serializable image of a [`MemorySettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub global: BTreeMap<String, GlobalConfigRow>,
    /// tenant id -> key -> value
    pub tenants: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    state: RwLock<SettingsSnapshot>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> DbResult<SettingsSnapshot> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> DbResult<RwLockReadGuard<'_, SettingsSnapshot>> {
        self.state.read().map_err(|_| DbError::Poisoned("settings"))
    }

    fn write(&self) -> DbResult<RwLockWriteGuard<'_, SettingsSnapshot>> {
        self.state.write().map_err(|_| DbError::Poisoned("settings"))
    }
}

impl SettingsStore for MemorySettings {
    fn set_global(&self, row: GlobalConfigRow) -> DbResult<()> {
        let mut state = self.write()?;
        state.global.insert(row.key.clone(), row);
        Ok(())
    }

    fn get_global(&self, key: &str) -> DbResult<GlobalConfigRow> {
        let state = self.read()?;
        state
            .global
            .get(key)
            .cloned()
            .ok_or_else(|| DbError::MissingKey(format!("no global configuration for key '{key}'")))
    }

    fn list_global(&self) -> DbResult<Vec<GlobalConfigRow>> {
        let state = self.read()?;
        Ok(state.global.values().cloned().collect())
    }

    fn delete_global(&self, key: &str) -> DbResult<()> {
        let mut state = self.write()?;
        state
            .global
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| DbError::MissingKey(format!("no global configuration for key '{key}'")))
    }

    fn set_tenant(&self, row: TenantConfigRow) -> DbResult<()> {
        let mut state = self.write()?;
        state
            .tenants
            .entry(row.tenant_id)
            .or_default()
            .insert(row.key, row.value);
        Ok(())
    }

    fn get_tenant(&self, tenant_id: &str, key: &str) -> DbResult<TenantConfigRow> {
        let state = self.read()?;
        state
            .tenants
            .get(tenant_id)
            .and_then(|entries| entries.get(key))
            .map(|value| TenantConfigRow {
                tenant_id: tenant_id.to_string(),
                key: key.to_string(),
                value: value.clone(),
            })
            .ok_or_else(|| {
                DbError::MissingKey(format!(
                    "no configuration for tenant '{tenant_id}' with key '{key}'"
                ))
            })
    }

    fn list_tenant(&self, tenant_id: &str) -> DbResult<Vec<TenantConfigRow>> {
        let state = self.read()?;
        Ok(state
            .tenants
            .get(tenant_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, value)| TenantConfigRow {
                        tenant_id: tenant_id.to_string(),
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_tenant(&self, tenant_id: &str, key: &str) -> DbResult<()> {
        let mut state = self.write()?;
        let entries = state.tenants.get_mut(tenant_id).ok_or_else(|| {
            DbError::MissingKey(format!("no configuration found for tenant '{tenant_id}'"))
        })?;
        if entries.remove(key).is_none() {
            return Err(DbError::MissingKey(format!(
                "no configuration for tenant '{tenant_id}' with key '{key}'"
            )));
        }
        if entries.is_empty() {
            state.tenants.remove(tenant_id);
        }
        Ok(())
    }
}
