//! Global configuration entries and per-tenant overrides.

use serde::{Deserialize, Serialize};
use tracing::debug;

use db::models::{GlobalConfigRow, TenantConfigRow};
use db::DbError;

use super::ConfigService;
use crate::{EngineError, EngineResult};

const MAX_KEY_LEN: usize = 255;
const MAX_TENANT_ID_LEN: usize = 40;

/// Body of a global entry; the key is passed separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// The tenant's own override.
    Custom,
    /// The global default.
    Default,
}

/// The value a tenant actually sees for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub key: String,
    pub value: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigService {
    pub fn set_global_config(&self, key: &str, config: GlobalConfig) -> EngineResult<()> {
        validate_key(key)?;
        self.store.settings().set_global(GlobalConfigRow {
            key: key.to_string(),
            default: config.default,
            description: config.description,
        })?;
        debug!("Global configuration '{}' set", key);
        Ok(())
    }

    pub fn get_global_config(&self, key: &str) -> EngineResult<GlobalConfigRow> {
        Ok(self.store.settings().get_global(key)?)
    }

    pub fn list_global_configs(&self) -> EngineResult<Vec<GlobalConfigRow>> {
        Ok(self.store.settings().list_global()?)
    }

    pub fn delete_global_config(&self, key: &str) -> EngineResult<()> {
        self.store.settings().delete_global(key)?;
        Ok(())
    }

    /// Create or replace a tenant override. The key must have a global entry.
    pub fn set_tenant_config(&self, tenant_id: &str, key: &str, value: &str) -> EngineResult<()> {
        self.check_override(tenant_id, key)?;
        self.write_override(tenant_id, key, value)
    }

    /// Set several overrides. Every entry is checked before any is written,
    /// so one invalid key leaves the tenant's overrides unchanged.
    pub fn set_tenant_configs(&self, tenant_id: &str, entries: &[(String, String)]) -> EngineResult<()> {
        for (key, _) in entries {
            self.check_override(tenant_id, key)?;
        }
        for (key, value) in entries {
            self.write_override(tenant_id, key, value)?;
        }
        Ok(())
    }

    fn check_override(&self, tenant_id: &str, key: &str) -> EngineResult<()> {
        validate_tenant(tenant_id)?;
        validate_key(key)?;
        self.store.settings().get_global(key).map_err(|e| match e {
            DbError::MissingKey(_) => {
                EngineError::NotFound(format!("no global configuration was found for key '{key}'"))
            }
            other => other.into(),
        })?;
        Ok(())
    }

    fn write_override(&self, tenant_id: &str, key: &str, value: &str) -> EngineResult<()> {
        self.store.settings().set_tenant(TenantConfigRow {
            tenant_id: tenant_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })?;
        debug!("Configuration '{}' set for tenant '{}'", key, tenant_id);
        Ok(())
    }

    pub fn delete_tenant_config(&self, tenant_id: &str, key: &str) -> EngineResult<()> {
        validate_tenant(tenant_id)?;
        self.store.settings().delete_tenant(tenant_id, key)?;
        Ok(())
    }

    /// Remove every override of a tenant.
    pub fn delete_tenant_configs(&self, tenant_id: &str) -> EngineResult<()> {
        validate_tenant(tenant_id)?;
        let settings = self.store.settings();
        for row in settings.list_tenant(tenant_id)? {
            settings.delete_tenant(tenant_id, &row.key)?;
        }
        Ok(())
    }

    /// The tenant's override if it has one, otherwise the global default.
    pub fn get_effective_config(&self, tenant_id: &str, key: &str) -> EngineResult<EffectiveConfig> {
        validate_tenant(tenant_id)?;
        let settings = self.store.settings();
        let global = settings.get_global(key)?;
        match settings.get_tenant(tenant_id, key) {
            Ok(custom) => Ok(EffectiveConfig {
                key: global.key,
                value: custom.value,
                value_type: ValueType::Custom,
                description: global.description,
            }),
            Err(DbError::MissingKey(_)) => Ok(EffectiveConfig {
                key: global.key,
                value: global.default,
                value_type: ValueType::Default,
                description: global.description,
            }),
            Err(other) => Err(other.into()),
        }
    }

    /// Effective value of every global key for a tenant, ordered by key.
    pub fn list_effective_configs(&self, tenant_id: &str) -> EngineResult<Vec<EffectiveConfig>> {
        validate_tenant(tenant_id)?;
        let settings = self.store.settings();
        let overrides = settings.list_tenant(tenant_id)?;
        Ok(settings
            .list_global()?
            .into_iter()
            .map(|global| match overrides.iter().find(|row| row.key == global.key) {
                Some(custom) => EffectiveConfig {
                    key: global.key,
                    value: custom.value.clone(),
                    value_type: ValueType::Custom,
                    description: global.description,
                },
                None => EffectiveConfig {
                    key: global.key,
                    value: global.default,
                    value_type: ValueType::Default,
                    description: global.description,
                },
            })
            .collect())
    }
}

fn validate_key(key: &str) -> EngineResult<()> {
    if key.is_empty() || key.chars().count() > MAX_KEY_LEN {
        return Err(EngineError::Validation(format!(
            "configuration key must be 1 to {MAX_KEY_LEN} characters long"
        )));
    }
    Ok(())
}

fn validate_tenant(tenant_id: &str) -> EngineResult<()> {
    if tenant_id.is_empty() || tenant_id.chars().count() > MAX_TENANT_ID_LEN {
        return Err(EngineError::Validation(format!(
            "tenant id must be 1 to {MAX_TENANT_ID_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::service;
    use pretty_assertions::assert_eq;

    fn global(default: &str) -> GlobalConfig {
        GlobalConfig {
            default: default.into(),
            description: Some("doc".into()),
        }
    }

    #[test]
    fn key_and_tenant_lengths_are_bounded() {
        let service = service();
        assert!(service.set_global_config(&"k".repeat(255), global("v")).is_ok());
        assert!(matches!(
            service.set_global_config(&"k".repeat(256), global("v")),
            Err(EngineError::Validation(_))
        ));

        service.set_global_config("k", global("v")).unwrap();
        assert!(matches!(
            service.set_tenant_config(&"t".repeat(41), "k", "x"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn override_requires_a_global_entry() {
        let service = service();
        assert!(matches!(
            service.set_tenant_config("t1", "unknown", "x"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn effective_config_prefers_the_override() {
        let service = service();
        service.set_global_config("a", global("default-a")).unwrap();
        service.set_global_config("b", global("default-b")).unwrap();
        service.set_tenant_config("t1", "b", "custom-b").unwrap();

        assert_eq!(
            service.get_effective_config("t1", "b").unwrap().value_type,
            ValueType::Custom
        );
        assert_eq!(
            service.get_effective_config("t2", "b").unwrap().value,
            "default-b"
        );

        let listed: Vec<(String, String, ValueType)> = service
            .list_effective_configs("t1")
            .unwrap()
            .into_iter()
            .map(|c| (c.key, c.value, c.value_type))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("a".into(), "default-a".into(), ValueType::Default),
                ("b".into(), "custom-b".into(), ValueType::Custom),
            ]
        );

        service.delete_tenant_configs("t1").unwrap();
        assert_eq!(
            service.get_effective_config("t1", "b").unwrap().value_type,
            ValueType::Default
        );
    }

    #[test]
    fn batch_override_is_all_or_nothing() {
        let service = service();
        service.set_global_config("a", global("default-a")).unwrap();
        service.set_global_config("b", global("default-b")).unwrap();

        let entries = vec![
            ("a".to_string(), "custom-a".to_string()),
            ("missing".to_string(), "x".to_string()),
        ];
        assert!(matches!(
            service.set_tenant_configs("t1", &entries),
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(
            service.get_effective_config("t1", "a").unwrap().value_type,
            ValueType::Default
        );

        let entries = vec![
            ("a".to_string(), "custom-a".to_string()),
            ("b".to_string(), "custom-b".to_string()),
        ];
        service.set_tenant_configs("t1", &entries).unwrap();
        assert_eq!(service.get_effective_config("t1", "a").unwrap().value, "custom-a");
        assert_eq!(service.get_effective_config("t1", "b").unwrap().value, "custom-b");
    }
}
