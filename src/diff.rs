//! A minimal path level difference listing between two documents; rich tree
//! diffing stays with the caller.

use crate::{Cursor, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub path: String,
    pub kind: DiffKind,
    pub left: Option<Value>,
    pub right: Option<Value>,
}

impl Display for DiffEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiffKind::Added => write!(
                f,
                "+ {}: {}",
                self.path,
                self.right.as_ref().unwrap_or(&Value::Null)
            ),
            DiffKind::Removed => write!(
                f,
                "- {}: {}",
                self.path,
                self.left.as_ref().unwrap_or(&Value::Null)
            ),
            DiffKind::Changed => write!(
                f,
                "~ {}: {} -> {}",
                self.path,
                self.left.as_ref().unwrap_or(&Value::Null),
                self.right.as_ref().unwrap_or(&Value::Null)
            ),
        }
    }
}

/// Compare two documents, returning one entry per differing path.
pub fn diff(left: &Value, right: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    walk(left, right, Cursor::root(), &mut entries);
    entries
}

fn walk(left: &Value, right: &Value, at: Cursor, entries: &mut Vec<DiffEntry>) {
    match (left, right) {
        (Value::Map(a), Value::Map(b)) => {
            for (key, left_value) in a.iter() {
                match b.get(key) {
                    Some(right_value) => {
                        walk(left_value, right_value, at.child(key.clone()), entries)
                    }
                    None => entries.push(DiffEntry {
                        path: at.child(key.clone()).to_string(),
                        kind: DiffKind::Removed,
                        left: Some(left_value.clone()),
                        right: None,
                    }),
                }
            }
            for (key, right_value) in b.iter() {
                if a.get(key).is_none() {
                    entries.push(DiffEntry {
                        path: at.child(key.clone()).to_string(),
                        kind: DiffKind::Added,
                        left: None,
                        right: Some(right_value.clone()),
                    });
                }
            }
        }
        (Value::Seq(a), Value::Seq(b)) => {
            for index in 0..a.len().max(b.len()) {
                let cursor = at.child(index.to_string());
                match (a.get(index), b.get(index)) {
                    (Some(left_value), Some(right_value)) => {
                        walk(left_value, right_value, cursor, entries)
                    }
                    (Some(left_value), None) => entries.push(DiffEntry {
                        path: cursor.to_string(),
                        kind: DiffKind::Removed,
                        left: Some(left_value.clone()),
                        right: None,
                    }),
                    (None, Some(right_value)) => entries.push(DiffEntry {
                        path: cursor.to_string(),
                        kind: DiffKind::Added,
                        left: None,
                        right: Some(right_value.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        (left, right) => {
            if left != right {
                entries.push(DiffEntry {
                    path: at.to_string(),
                    kind: DiffKind::Changed,
                    left: Some(left.clone()),
                    right: Some(right.clone()),
                });
            }
        }
    }
}
