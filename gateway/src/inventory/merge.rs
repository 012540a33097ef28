//! Upsert-by-identity merge of discovered devices into the stored inventory
//!
//! Field precedence:
//!
//! | field                                         | winner                      |
//! |-----------------------------------------------|-----------------------------|
//! | `id`                                          | existing, discovered fills  |
//! | `name`, `room`, `icon`                        | existing, discovered fills  |
//! | `ip`, `gen`, `model`, `mac`, `type`, `port`, `url`, extra keys | discovered, existing fills |

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::GatewayError;
use crate::models::device::{DeviceId, DeviceRecord};

/// Merge a single discovered record into an existing one
pub fn merge_record(existing: &DeviceRecord, discovered: &DeviceRecord) -> DeviceRecord {
    let mut extra = existing.extra.clone();
    for (key, value) in &discovered.extra {
        extra.insert(key.clone(), value.clone());
    }

    let mut merged = DeviceRecord {
        id: existing.id.clone().or_else(|| discovered.id.clone()),
        name: existing.name.clone().or_else(|| discovered.name.clone()),
        room: existing.room.clone().or_else(|| discovered.room.clone()),
        icon: existing.icon.clone().or_else(|| discovered.icon.clone()),
        ip: discovered.ip.clone().or_else(|| existing.ip.clone()),
        gen: discovered.gen.or(existing.gen),
        model: discovered.model.clone().or_else(|| existing.model.clone()),
        mac: discovered.mac.clone().or_else(|| existing.mac.clone()),
        kind: discovered.kind.clone().or_else(|| existing.kind.clone()),
        port: discovered.port.clone().or_else(|| existing.port.clone()),
        url: discovered.url.clone().or_else(|| existing.url.clone()),
        extra,
    };
    merged.drop_shadowed_extra();
    merged
}

/// Position of the record `record` would merge into.
///
/// Identity keys are compared first. A record known only by address
/// matches an entry with the same `ip` when one of the two has no id yet.
fn position_of(list: &[DeviceRecord], record: &DeviceRecord, key: &str) -> Option<usize> {
    list.iter()
        .position(|r| r.identity_key().as_deref() == Some(key))
        .or_else(|| {
            let ip = record.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty())?;
            list.iter().position(|r| {
                (r.id.is_none() || record.id.is_none())
                    && r.ip.as_deref().map(str::trim) == Some(ip)
            })
        })
}

/// Reconcile `discovered` into `existing`.
///
/// Existing order is kept, new devices are appended in discovery order and
/// duplicates inside `discovered` collapse into one entry. Records without
/// an id or ip are skipped. Running the same merge twice is a no-op.
pub fn merge(existing: &[DeviceRecord], discovered: &[DeviceRecord]) -> Vec<DeviceRecord> {
    let mut merged = existing.to_vec();

    for record in discovered {
        let Some(key) = record.identity_key() else {
            debug!("Skipping discovered device without id or ip");
            continue;
        };

        match position_of(&merged, record, &key) {
            Some(index) => {
                let next = merge_record(&merged[index], record);
                merged[index] = next;
            }
            None => merged.push(record.clone()),
        }
    }

    merged
}

/// Append a new record; rejects records that duplicate an existing identity
pub fn add(list: &mut Vec<DeviceRecord>, record: DeviceRecord) -> Result<(), GatewayError> {
    let key = record.identity_key().ok_or_else(|| {
        GatewayError::ValidationError("Device needs an id or ip".to_string())
    })?;

    if position_of(list, &record, &key).is_some() {
        return Err(GatewayError::ValidationError(format!(
            "Device already exists: {}",
            key
        )));
    }

    list.push(record);
    Ok(())
}

/// Shallow-apply a JSON object patch to the record addressed by `key`
pub fn update<'a>(
    list: &'a mut [DeviceRecord],
    key: &str,
    patch: &Value,
) -> Result<&'a DeviceRecord, GatewayError> {
    let Value::Object(patch) = patch else {
        return Err(GatewayError::ValidationError(
            "Updates must be an object".to_string(),
        ));
    };

    let index = list
        .iter()
        .position(|r| r.matches_key(key))
        .ok_or_else(|| GatewayError::NotFound(format!("Device not found: {}", key)))?;

    let mut value = list[index].to_value()?;
    if let Value::Object(fields) = &mut value {
        for (field, v) in patch {
            fields.insert(field.clone(), v.clone());
        }
    }
    let updated: DeviceRecord = serde_json::from_value(value)
        .map_err(|e| GatewayError::ValidationError(format!("Invalid device update: {}", e)))?;

    if let Some(new_key) = updated.identity_key() {
        let collides = list
            .iter()
            .enumerate()
            .any(|(i, r)| i != index && r.identity_key().as_deref() == Some(new_key.as_str()));
        if collides {
            return Err(GatewayError::ValidationError(format!(
                "Device already exists: {}",
                new_key
            )));
        }
    }

    list[index] = updated;
    Ok(&list[index])
}

/// Remove every record addressed by `key`; returns how many were removed
pub fn remove(list: &mut Vec<DeviceRecord>, key: &str) -> usize {
    let before = list.len();
    list.retain(|r| !r.matches_key(key));
    before - list.len()
}

/// A bulk edit of user-owned fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEdit {
    #[serde(default)]
    pub id: Option<DeviceId>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl UserEdit {
    fn targets(&self, record: &DeviceRecord) -> bool {
        let by_id = match (&self.id, &record.id) {
            (Some(edit), Some(id)) => edit.canonical() == id.canonical(),
            _ => false,
        };
        let by_ip = match (self.ip.as_deref(), record.ip.as_deref()) {
            (Some(edit), Some(ip)) => !edit.trim().is_empty() && edit.trim() == ip.trim(),
            _ => false,
        };
        by_id || by_ip
    }
}

fn edited(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

/// Apply `name`/`room`/`icon` edits; empty or missing values leave the field alone.
/// Returns how many records were changed.
pub fn apply_user_edits(list: &mut [DeviceRecord], edits: &[UserEdit]) -> usize {
    let mut changed = 0;
    for record in list.iter_mut() {
        let Some(edit) = edits.iter().find(|e| e.targets(record)) else {
            continue;
        };
        let before = record.clone();
        if let Some(name) = edited(&edit.name) {
            record.name = Some(name);
        }
        if let Some(room) = edited(&edit.room) {
            record.room = Some(room);
        }
        if let Some(icon) = edited(&edit.icon) {
            record.icon = Some(icon);
        }
        if *record != before {
            changed += 1;
        }
    }
    changed
}
