//! The persistence contract the engine works against, and its in-memory
//! implementation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use db::repository::memory::{MemoryTable, TableSnapshot};
use db::repository::settings::{MemorySettings, SettingsSnapshot};
use db::{DbError, EntityStore, SettingsStore};

use crate::{
    condition::Condition,
    models::{Action, ActionType, ProcessingRule, Workflow},
    EngineResult,
};

/// One table per entity kind plus the settings store.
///
/// Rule conditions are stored under `Scope::Rule`, action conditions under
/// `Scope::Action`, both in [`conditions`](ConfigEntityStore::conditions).
pub trait ConfigEntityStore: Send + Sync {
    fn workflows(&self) -> &dyn EntityStore<Workflow>;
    fn rules(&self) -> &dyn EntityStore<ProcessingRule>;
    fn actions(&self) -> &dyn EntityStore<Action>;
    fn conditions(&self) -> &dyn EntityStore<Condition>;
    fn action_types(&self) -> &dyn EntityStore<ActionType>;
    fn settings(&self) -> &dyn SettingsStore;
}

/// Serializable image of a [`MemoryConfigStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    pub workflows: TableSnapshot<Workflow>,
    pub rules: TableSnapshot<ProcessingRule>,
    pub actions: TableSnapshot<Action>,
    pub conditions: TableSnapshot<Condition>,
    pub action_types: TableSnapshot<ActionType>,
    pub settings: SettingsSnapshot,
}

#[derive(Debug)]
pub struct MemoryConfigStore {
    workflows: MemoryTable<Workflow>,
    rules: MemoryTable<ProcessingRule>,
    actions: MemoryTable<Action>,
    conditions: MemoryTable<Condition>,
    action_types: MemoryTable<ActionType>,
    settings: MemorySettings,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            workflows: MemoryTable::from_snapshot("workflow", snapshot.workflows),
            rules: MemoryTable::from_snapshot("processing rule", snapshot.rules),
            actions: MemoryTable::from_snapshot("action", snapshot.actions),
            conditions: MemoryTable::from_snapshot("condition", snapshot.conditions),
            action_types: MemoryTable::from_snapshot("action type", snapshot.action_types),
            settings: MemorySettings::from_snapshot(snapshot.settings),
        }
    }

    pub fn snapshot(&self) -> EngineResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            workflows: self.workflows.snapshot()?,
            rules: self.rules.snapshot()?,
            actions: self.actions.snapshot()?,
            conditions: self.conditions.snapshot()?,
            action_types: self.action_types.snapshot()?,
            settings: self.settings.snapshot()?,
        })
    }

    /// Write the whole store to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot()?).map_err(DbError::from)?;
        fs::write(path, json).map_err(DbError::from)?;
        info!("Saved configuration store to {}", path.display());
        Ok(())
    }

    /// Read a store written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(DbError::from)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&text).map_err(DbError::from)?;
        info!("Loaded configuration store from {}", path.display());
        Ok(Self::from_snapshot(snapshot))
    }

    /// [`load`](Self::load), or an empty store if `path` does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No configuration store at {}; starting empty", path.display());
            Ok(Self::new())
        }
    }
}

impl ConfigEntityStore for MemoryConfigStore {
    fn workflows(&self) -> &dyn EntityStore<Workflow> {
        &self.workflows
    }

    fn rules(&self) -> &dyn EntityStore<ProcessingRule> {
        &self.rules
    }

    fn actions(&self) -> &dyn EntityStore<Action> {
        &self.actions
    }

    fn conditions(&self) -> &dyn EntityStore<Condition> {
        &self.conditions
    }

    fn action_types(&self) -> &dyn EntityStore<ActionType> {
        &self.action_types
    }

    fn settings(&self) -> &dyn SettingsStore {
        &self.settings
    }
}
