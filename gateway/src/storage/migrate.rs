//! Versioned config migration
//!
//! Migration is additive: new defaults are merged underneath whatever the
//! user already has. Fields can be added this way but never removed or
//! renamed; a rename needs an explicit shim.

use serde_json::{Map, Value};
use tracing::info;

use crate::errors::GatewayError;
use crate::models::config::{Config, CONFIG_VERSION, LEGACY_CONFIG_VERSION};

/// Outcome of running [`migrate`] on a stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// The (possibly unchanged) document
    pub value: Value,
    /// Version found on disk
    pub from_version: u32,
    /// Whether anything was rewritten
    pub migrated: bool,
}

/// Canonical defaults as a JSON document
pub fn default_document() -> Result<Value, GatewayError> {
    Ok(serde_json::to_value(Config::default())?)
}

/// Version stamped on a raw document, `1` when absent or unreadable
pub fn stored_version(raw: &Value) -> u32 {
    raw.get("_version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(LEGACY_CONFIG_VERSION)
}

/// Bring `raw` up to [`CONFIG_VERSION`].
///
/// Documents already at (or beyond) the current version are returned as-is.
pub fn migrate(raw: Value) -> Result<Migration, GatewayError> {
    let from_version = stored_version(&raw);
    if from_version >= CONFIG_VERSION {
        return Ok(Migration {
            value: raw,
            from_version,
            migrated: false,
        });
    }

    info!(
        "Migrating config from v{} to v{}...",
        from_version, CONFIG_VERSION
    );

    let defaults = default_document()?;
    let mut value = deep_merge(&raw, &defaults);
    if let Value::Object(map) = &mut value {
        map.insert("_version".to_string(), Value::from(CONFIG_VERSION));
    }

    Ok(Migration {
        value,
        from_version,
        migrated: true,
    })
}

/// Merge `defaults` underneath `existing`.
///
/// For every key in `defaults`:
/// - null defaults are skipped
/// - arrays: a non-empty existing array is kept, otherwise the default is adopted
/// - objects: merged recursively
/// - scalars: an existing non-null value is kept
///
/// A populated existing value is never replaced, even when its type differs
/// from the default. Keys only present in `existing` are kept.
pub fn deep_merge(existing: &Value, defaults: &Value) -> Value {
    let Value::Object(defaults) = defaults else {
        return if existing.is_null() {
            defaults.clone()
        } else {
            existing.clone()
        };
    };

    let mut result = match existing {
        Value::Object(map) => map.clone(),
        // Nothing usable on the existing side; start from an empty object
        _ => Map::new(),
    };

    for (key, default) in defaults {
        if default.is_null() {
            continue;
        }

        let current = result.get(key);
        let merged = match default {
            Value::Array(_) => match current {
                Some(Value::Array(items)) if items.is_empty() => Some(default.clone()),
                Some(value) if !value.is_null() => None,
                _ => Some(default.clone()),
            },
            Value::Object(_) => match current {
                Some(value @ Value::Object(_)) => Some(deep_merge(value, default)),
                Some(value) if !value.is_null() => None,
                _ => Some(default.clone()),
            },
            _ => match current {
                Some(value) if !value.is_null() => None,
                _ => Some(default.clone()),
            },
        };

        if let Some(value) = merged {
            result.insert(key.clone(), value);
        }
    }

    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_existing_scalars_win() {
        let existing = json!({ "settings": { "theme": "light" } });
        let defaults = json!({ "settings": { "theme": "dark", "temperatureUnit": "F" } });

        let merged = deep_merge(&existing, &defaults);
        assert_eq!(merged["settings"]["theme"], "light");
        assert_eq!(merged["settings"]["temperatureUnit"], "F");
    }

    #[test]
    fn test_empty_arrays_adopt_defaults() {
        let existing = json!({ "scenes": [], "shelly": [{ "ip": "10.0.0.2" }] });
        let defaults = json!({ "scenes": [{ "name": "morning" }], "shelly": [] });

        let merged = deep_merge(&existing, &defaults);
        assert_eq!(merged["scenes"], json!([{ "name": "morning" }]));
        assert_eq!(merged["shelly"], json!([{ "ip": "10.0.0.2" }]));
    }

    #[test]
    fn test_null_existing_adopts_default() {
        let existing = json!({ "location": null });
        let defaults = json!({ "location": {} });
        assert_eq!(deep_merge(&existing, &defaults)["location"], json!({}));
    }

    #[test]
    fn test_type_mismatch_keeps_user_value() {
        let existing = json!({ "settings": "custom" });
        let defaults = json!({ "settings": { "theme": "dark" } });
        assert_eq!(deep_merge(&existing, &defaults)["settings"], "custom");
    }

    #[test]
    fn test_current_version_untouched() {
        let raw = json!({ "_version": CONFIG_VERSION, "shelly": [] });
        let migration = migrate(raw.clone()).unwrap();
        assert!(!migration.migrated);
        assert_eq!(migration.value, raw);
    }

    #[test]
    fn test_legacy_document_is_stamped() {
        let migration = migrate(json!({ "shelly": [{ "ip": "10.0.0.2" }] })).unwrap();
        assert!(migration.migrated);
        assert_eq!(migration.from_version, LEGACY_CONFIG_VERSION);
        assert_eq!(migration.value["_version"], json!(CONFIG_VERSION));
        assert_eq!(migration.value["settings"]["ringSnapshotInterval"], json!(30));
    }
}
