//! JSON files read and written through the staged tree.

use jsonc_parser::ParseOptions;
use monotree_core::{MonotreeError, Result};
use monotree_tree::{StagedTree, TreePath};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Read and deserialize a JSON file.
///
/// Comments and trailing commas are accepted: tsconfig files and most
/// workspace configuration are JSONC. A file that still does not parse is a
/// `Parse` error.
pub fn read_json<T: DeserializeOwned>(tree: &StagedTree, path: &TreePath) -> Result<T> {
    let content = tree.read_to_string(path)?;
    let parse_error = |message: String| MonotreeError::parse(path.to_string(), message);

    let value = jsonc_parser::parse_to_serde_value(&content, &ParseOptions::default())
        .map_err(|e| parse_error(e.to_string()))?
        .ok_or_else(|| parse_error("empty document".to_string()))?;
    serde_json::from_value(value).map_err(|e| parse_error(e.to_string()))
}

/// Serialize as two-space pretty JSON with a trailing newline and stage it.
pub fn write_json<T: Serialize>(tree: &mut StagedTree, path: &TreePath, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    tree.write(path, content)
}

/// Read, modify and write back a JSON document.
pub fn update_json<F>(tree: &mut StagedTree, path: &TreePath, update: F) -> Result<()>
where
    F: FnOnce(&mut Value) -> Result<()>,
{
    let mut value: Value = read_json(tree, path)?;
    update(&mut value)?;
    write_json(tree, path, &value)
}

/// Bring `document` in line with `updated` without disturbing its layout.
///
/// Keys present in both keep their position in `document`, keys only in
/// `updated` are appended, and keys missing from `updated` are dropped
/// unless they hold an empty object or array, which reads the same as an
/// absent key.
pub fn merge_in_place(document: &mut Map<String, Value>, mut updated: Map<String, Value>) {
    document.retain(|key, value| updated.contains_key(key) || is_empty_collection(value));
    for (key, value) in document.iter_mut() {
        if let Some(new_value) = updated.remove(key) {
            *value = new_value;
        }
    }
    for (key, value) in updated {
        document.insert(key, value);
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Escape one reference token of a JSON pointer.
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Visit every string inside `value` together with its JSON pointer.
pub fn visit_strings<F>(value: &Value, pointer: &str, visit: &mut F)
where
    F: FnMut(&str, &str),
{
    match value {
        Value::String(s) => visit(pointer, s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                visit_strings(item, &format!("{}/{}", pointer, i), visit);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                visit_strings(item, &format!("{}/{}", pointer, escape_pointer_token(key)), visit);
            }
        }
        _ => {}
    }
}

/// Replace every string inside `value` for which `rewrite` returns a new one.
pub fn rewrite_strings<F>(value: &mut Value, rewrite: &F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => match rewrite(s) {
            Some(new) if new != *s => {
                *s = new;
                1
            }
            _ => 0,
        },
        Value::Array(items) => items.iter_mut().map(|item| rewrite_strings(item, rewrite)).sum(),
        Value::Object(map) => map.values_mut().map(|item| rewrite_strings(item, rewrite)).sum(),
        _ => 0,
    }
}

/// Rename a key of the object at `pointer`, keeping its position.
///
/// Returns false when the object or the key is missing.
pub fn rename_key(document: &mut Value, pointer: &str, old_key: &str, new_key: &str) -> bool {
    let Some(Value::Object(map)) = document.pointer_mut(pointer) else {
        return false;
    };
    if !map.contains_key(old_key) {
        return false;
    }

    let entries = std::mem::take(map);
    for (key, value) in entries {
        if key == old_key {
            map.insert(new_key.to_string(), value);
        } else {
            map.insert(key, value);
        }
    }
    true
}
