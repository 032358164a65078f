//! Post-processing of the resolved tree: prune, cherry-pick and the final
//! self-reference check before serialization.

use crate::{Cursor, Error, ErrorKind, Map, Value};

/// The default depth bound of [cycle_check].
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// Remove the listed paths from the tree. Pruning a path which does not exist is
/// the identity.
pub fn prune(tree: &mut Value, paths: &[String]) -> Result<(), Error> {
    for path in paths {
        let cursor = Cursor::parse(path)?;
        cursor.remove(tree)?;
    }
    Ok(())
}

/// Project the tree to the union of the listed paths, in list order. Every path
/// must exist; a missing one fails with the narrowest missing prefix.
pub fn cherry_pick(tree: &Value, paths: &[String]) -> Result<Value, Error> {
    let mut picked = Map::new();
    for path in paths {
        let cursor = Cursor::parse(path)?;
        let value = cursor.resolve(tree)?.clone();
        graft_at(&mut picked, cursor.segments(), value);
    }
    Ok(Value::Map(picked))
}

fn graft_at(out: &mut Map, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            out.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            if !matches!(out.get(head), Some(Value::Map(_))) {
                out.insert(head.clone(), Value::Map(Map::new()));
            }
            if let Some(Value::Map(inner)) = out.get_mut(head) {
                graft_at(inner, rest, value);
            }
        }
    }
}

/// Walk the tree with a bounded depth and a visiting set of container
/// identities; a revisit or depth exhaustion fails closed.
pub fn cycle_check(tree: &Value, max_depth: usize) -> Result<(), Error> {
    let mut visiting: Vec<*const Value> = Vec::new();
    check(tree, max_depth, &mut visiting)
}

fn check(node: &Value, budget: usize, visiting: &mut Vec<*const Value>) -> Result<(), Error> {
    let children: Vec<&Value> = match node {
        Value::Seq(items) => items.iter().collect(),
        Value::Map(map) => map.iter().map(|(_, value)| value).collect(),
        _ => return Ok(()),
    };

    if budget == 0 {
        return Err(self_referencing());
    }
    let identity = node as *const Value;
    if visiting.contains(&identity) {
        return Err(self_referencing());
    }
    visiting.push(identity);
    for child in children {
        check(child, budget - 1, visiting)?;
    }
    visiting.pop();
    Ok(())
}

fn self_referencing() -> Error {
    Error::new(ErrorKind::Cycle, "self-referencing dataset".to_string())
}
