//! Structural diff and patch over JSON values.
//!
//! Operations address nodes with JSON pointers (`/entity/attributes/0/id`).
//! `Remove` and `Replace` carry the value they expect to find, which makes
//! every operation invertible and lets [`Patch::apply`] detect that it is
//! being applied to a state it was not computed against.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors applying a patch. The target value is never left half-patched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid array index in path: {0}")]
    InvalidIndex(String),

    #[error("value at {0} is not an object or array")]
    NotAContainer(String),

    /// The value at the path differs from the one the operation was computed against.
    #[error("conflicting value at {0}")]
    Conflict(String),
}

/// One structural edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Add { path: String, value: Value },
    Remove { path: String, old: Value },
    Replace { path: String, old: Value, value: Value },
}

impl Operation {
    pub fn path(&self) -> &str {
        match self {
            Operation::Add { path, .. }
            | Operation::Remove { path, .. }
            | Operation::Replace { path, .. } => path,
        }
    }

    /// The operation undoing this one.
    pub fn inverse(&self) -> Operation {
        match self {
            Operation::Add { path, value } => Operation::Remove {
                path: path.clone(),
                old: value.clone(),
            },
            Operation::Remove { path, old } => Operation::Add {
                path: path.clone(),
                value: old.clone(),
            },
            Operation::Replace { path, old, value } => Operation::Replace {
                path: path.clone(),
                old: value.clone(),
                value: old.clone(),
            },
        }
    }
}

/// An ordered list of operations together with the list that undoes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub operations: Vec<Operation>,
    pub inverse: Vec<Operation>,
}

impl Patch {
    pub fn new(operations: Vec<Operation>) -> Self {
        let inverse = operations.iter().rev().map(Operation::inverse).collect();
        Self { operations, inverse }
    }

    /// Patch turning `old` into `new`; `None` when they are equal.
    pub fn between(old: &Value, new: &Value) -> Option<Self> {
        let operations = diff(old, new);
        (!operations.is_empty()).then(|| Self::new(operations))
    }

    /// The patch undoing this one.
    pub fn inverted(&self) -> Self {
        Self {
            operations: self.inverse.clone(),
            inverse: self.operations.clone(),
        }
    }

    /// Apply to a copy of `target`, returning the patched copy.
    pub fn apply(&self, target: &Value) -> Result<Value, PatchError> {
        apply(target, &self.operations)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

// ============================================================================
// DIFF
// ============================================================================

/// Operations turning `old` into `new`, in application order.
///
/// Objects are compared key by key, arrays index by index with trailing
/// removals applied from the end. Anything else that differs is replaced.
pub fn diff(old: &Value, new: &Value) -> Vec<Operation> {
    let mut ops = Vec::new();
    diff_at(&mut String::new(), old, new, &mut ops);
    ops
}

fn diff_at(path: &mut String, old: &Value, new: &Value, ops: &mut Vec<Operation>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                if !new_map.contains_key(key) {
                    ops.push(Operation::Remove {
                        path: child_path(path, key),
                        old: old_value.clone(),
                    });
                }
            }
            for (key, new_value) in new_map {
                match old_map.get(key) {
                    Some(old_value) => {
                        let len = path.len();
                        path.push('/');
                        push_escaped(path, key);
                        diff_at(path, old_value, new_value, ops);
                        path.truncate(len);
                    }
                    None => ops.push(Operation::Add {
                        path: child_path(path, key),
                        value: new_value.clone(),
                    }),
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let common = old_items.len().min(new_items.len());
            for i in 0..common {
                let len = path.len();
                path.push('/');
                path.push_str(&i.to_string());
                diff_at(path, &old_items[i], &new_items[i], ops);
                path.truncate(len);
            }
            for i in (common..old_items.len()).rev() {
                ops.push(Operation::Remove {
                    path: format!("{path}/{i}"),
                    old: old_items[i].clone(),
                });
            }
            for (i, item) in new_items.iter().enumerate().skip(common) {
                ops.push(Operation::Add {
                    path: format!("{path}/{i}"),
                    value: item.clone(),
                });
            }
        }
        _ => ops.push(Operation::Replace {
            path: path.clone(),
            old: old.clone(),
            value: new.clone(),
        }),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    let mut path = String::with_capacity(parent.len() + key.len() + 1);
    path.push_str(parent);
    path.push('/');
    push_escaped(&mut path, key);
    path
}

fn push_escaped(path: &mut String, key: &str) {
    for c in key.chars() {
        match c {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            c => path.push(c),
        }
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

// ============================================================================
// APPLY
// ============================================================================

/// Apply operations to a copy of `target`. Either all apply or none do.
pub fn apply(target: &Value, operations: &[Operation]) -> Result<Value, PatchError> {
    let mut value = target.clone();
    for op in operations {
        apply_one(&mut value, op)?;
    }
    Ok(value)
}

fn apply_one(doc: &mut Value, op: &Operation) -> Result<(), PatchError> {
    let path = op.path();
    let Some(pointer) = path.strip_prefix('/') else {
        // Whole-document operation.
        if !path.is_empty() {
            return Err(PatchError::PathNotFound(path.to_string()));
        }
        return match op {
            Operation::Add { value, .. } => {
                *doc = value.clone();
                Ok(())
            }
            Operation::Remove { old, .. } => {
                check(doc, old, path)?;
                *doc = Value::Null;
                Ok(())
            }
            Operation::Replace { old, value, .. } => {
                check(doc, old, path)?;
                *doc = value.clone();
                Ok(())
            }
        };
    };

    let tokens: Vec<String> = pointer.split('/').map(unescape).collect();
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
    let mut parent = &mut *doc;
    for token in parents {
        parent = match parent {
            Value::Object(map) => map.get_mut(token.as_str()),
            Value::Array(items) => items.get_mut(index(token, path)?),
            _ => return Err(PatchError::NotAContainer(path.to_string())),
        }
        .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
    }

    match parent {
        Value::Object(map) => match op {
            Operation::Add { value, .. } => {
                map.insert(last.clone(), value.clone());
            }
            Operation::Remove { old, .. } => {
                let current = map
                    .get(last.as_str())
                    .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
                check(current, old, path)?;
                map.remove(last.as_str());
            }
            Operation::Replace { old, value, .. } => {
                let current = map
                    .get_mut(last.as_str())
                    .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
                check(current, old, path)?;
                *current = value.clone();
            }
        },
        Value::Array(items) => match op {
            Operation::Add { value, .. } => {
                let i = if last == "-" { items.len() } else { index(last, path)? };
                if i > items.len() {
                    return Err(PatchError::InvalidIndex(path.to_string()));
                }
                items.insert(i, value.clone());
            }
            Operation::Remove { old, .. } => {
                let i = index(last, path)?;
                let current = items
                    .get(i)
                    .ok_or_else(|| PatchError::InvalidIndex(path.to_string()))?;
                check(current, old, path)?;
                items.remove(i);
            }
            Operation::Replace { old, value, .. } => {
                let i = index(last, path)?;
                let current = items
                    .get_mut(i)
                    .ok_or_else(|| PatchError::InvalidIndex(path.to_string()))?;
                check(current, old, path)?;
                *current = value.clone();
            }
        },
        _ => return Err(PatchError::NotAContainer(path.to_string())),
    }
    Ok(())
}

fn index(token: &str, path: &str) -> Result<usize, PatchError> {
    // Leading zeros are not valid array indices.
    if token.len() > 1 && token.starts_with('0') {
        return Err(PatchError::InvalidIndex(path.to_string()));
    }
    token
        .parse()
        .map_err(|_| PatchError::InvalidIndex(path.to_string()))
}

fn check(current: &Value, expected: &Value, path: &str) -> Result<(), PatchError> {
    if current == expected {
        Ok(())
    } else {
        Err(PatchError::Conflict(path.to_string()))
    }
}
