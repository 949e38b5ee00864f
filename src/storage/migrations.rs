use serde_json::{Map, Value};

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

fn get_migrations() -> Vec<MigrationFn> {
    vec![migrate_v1_to_v2]
}

/// Version 1 is a raw backend export: a bare node array, or an object
/// without a `version` field.
pub fn detect_version(value: &Value) -> Result<u32, StorageError> {
    match value.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::Malformed(format!("version must be a non-negative integer, got {v}"))),
        None => Ok(1),
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version == to_version {
        return Ok(data);
    }

    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration_idx = (version - 1) as usize; // v1→v2 is at index 0

        let Some(migration) = migrations.get(migration_idx) else {
            return Err(StorageError::MissingMigration(version));
        };

        data = migration(data)?;
    }

    Ok(data)
}

/// v1 exports carry the hierarchical code as `code` and have no board or
/// catalog sections.
fn migrate_v1_to_v2(value: Value) -> Result<Value, StorageError> {
    let mut obj = match value {
        Value::Array(nodes) => {
            let mut obj = Map::new();
            obj.insert("nodes".to_string(), Value::Array(nodes));
            obj
        }
        Value::Object(obj) => obj,
        other => {
            return Err(StorageError::Malformed(format!(
                "expected a node array or a snapshot object, got {other}"
            )));
        }
    };

    obj.insert("version".to_string(), Value::from(2));

    if let Some(nodes) = obj.get_mut("nodes").and_then(|n| n.as_array_mut()) {
        for node in nodes {
            if let Some(node_obj) = node.as_object_mut()
                && !node_obj.contains_key("wbsCode")
                && let Some(code) = node_obj.remove("code")
            {
                node_obj.insert("wbsCode".to_string(), code);
            }
        }
    }

    obj.entry("nodes").or_insert_with(|| Value::Array(vec![]));
    obj.entry("board").or_insert_with(|| Value::Array(vec![]));
    obj.entry("catalog").or_insert_with(|| Value::Array(vec![]));

    Ok(Value::Object(obj))
}
