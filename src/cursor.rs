use crate::{Cursor, Error, ErrorKind, Value};
use std::fmt::{Display, Formatter};

/// The mapping fields a sequence element may be addressed by.
pub const NAME_FIELDS: [&str; 3] = ["name", "key", "id"];

impl Cursor {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a dotted, optionally bracketed path.
    ///
    /// A dot separates segments outside brackets; `[k]` forces `k` to be a single
    /// segment even if it contains dots; a leading `$` root marker is stripped; an
    /// unmatched `]` is a syntax error.
    pub fn parse(path: &str) -> Result<Self, Error> {
        let mut segments: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_bracket = false;

        for (index, c) in path.char_indices() {
            match c {
                '[' if !in_bracket => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    in_bracket = true;
                }
                ']' => {
                    if !in_bracket {
                        return Err(Error::new(
                            ErrorKind::Syntax,
                            format!("unmatched `]` at offset {} in path `{}`", index, path),
                        ));
                    }
                    segments.push(std::mem::take(&mut current));
                    in_bracket = false;
                }
                '.' if !in_bracket => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            }
        }
        if in_bracket {
            return Err(Error::new(
                ErrorKind::Syntax,
                format!("unterminated `[` in path `{}`", path),
            ));
        }
        if !current.is_empty() {
            segments.push(current);
        }

        if segments.first().map(String::as_str) == Some("$") {
            segments.remove(0);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Cursor> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Cursor::from_segments(
            self.segments[..self.segments.len() - 1].to_vec(),
        ))
    }

    pub fn child(&self, segment: impl Into<String>) -> Cursor {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Cursor::from_segments(segments)
    }

    pub fn is_prefix_of(&self, other: &Cursor) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// Whether either cursor addresses a point inside the other's subtree.
    pub fn overlaps(&self, other: &Cursor) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Resolve the cursor against a tree.
    ///
    /// At a mapping, the segment is looked up as a key. At a sequence, the segment
    /// is first parsed as an unsigned index; when that fails the sequence is scanned
    /// for a mapping whose `name`, `key` or `id` field equals the segment. Errors
    /// carry the narrowest failing prefix.
    pub fn resolve<'tree>(&self, tree: &'tree Value) -> Result<&'tree Value, Error> {
        let mut node = tree;
        for (depth, segment) in self.segments.iter().enumerate() {
            node = step(node, segment).map_err(|kind| self.step_error(kind, node, depth))?;
        }
        Ok(node)
    }

    pub fn resolve_mut<'tree>(&self, tree: &'tree mut Value) -> Result<&'tree mut Value, Error> {
        let mut node = tree;
        for (depth, segment) in self.segments.iter().enumerate() {
            let kind = match step_index(node, segment) {
                Ok(found) => {
                    node = match (node, found) {
                        (Value::Map(map), StepIndex::Key(index)) => &mut map.entries[index].1,
                        (Value::Seq(items), StepIndex::Index(index)) => &mut items[index],
                        _ => unreachable!("step index matches the node shape"),
                    };
                    continue;
                }
                Err(kind) => kind,
            };
            return Err(self.step_error(kind, node, depth));
        }
        Ok(node)
    }

    /// Replace the value the cursor addresses.
    pub fn set(&self, tree: &mut Value, value: Value) -> Result<(), Error> {
        let slot = self.resolve_mut(tree)?;
        *slot = value;
        Ok(())
    }

    /// Remove the addressed key or element; `Ok(None)` when the path is absent.
    pub fn remove(&self, tree: &mut Value) -> Result<Option<Value>, Error> {
        let last = match self.segments.last() {
            Some(last) => last,
            None => return Ok(None),
        };
        let parent = match self.parent().unwrap_or_else(Cursor::root).resolve_mut(tree) {
            Ok(parent) => parent,
            Err(_) => return Ok(None),
        };
        match parent {
            Value::Map(map) => Ok(map.remove(last)),
            Value::Seq(items) => match find_element(items, last) {
                Some(index) => Ok(Some(items.remove(index))),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Expand `*` segments against a tree, producing every matching canonical
    /// cursor. Non `*` segments resolve as in [resolve](Cursor::resolve).
    pub fn glob(&self, tree: &Value) -> Result<Vec<Cursor>, Error> {
        let mut matches = Vec::new();
        glob_walk(tree, &self.segments, Cursor::root(), &mut matches)?;
        Ok(matches)
    }

    /// Rewrite list-by-name lookups to numeric indices, best effort: segments past
    /// the first unresolvable one are kept verbatim.
    pub fn canonicalize(&self, tree: &Value) -> Cursor {
        let mut node = Some(tree);
        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match node {
                Some(Value::Seq(items)) => match find_element(items, segment) {
                    Some(index) => {
                        segments.push(index.to_string());
                        node = items.get(index);
                    }
                    None => {
                        segments.push(segment.clone());
                        node = None;
                    }
                },
                Some(current) => {
                    segments.push(segment.clone());
                    node = step(current, segment).ok();
                }
                None => segments.push(segment.clone()),
            }
        }
        Cursor::from_segments(segments)
    }

    fn step_error(&self, kind: StepErrorKind, node: &Value, depth: usize) -> Error {
        let prefix = self.segments[..=depth].join(".");
        match kind {
            StepErrorKind::Missing => Error::not_found(&prefix),
            StepErrorKind::Scalar => {
                let consumed = self.segments[..depth].join(".");
                Error::type_mismatch(&consumed, "mapping or sequence", node.type_name())
            }
        }
    }
}

enum StepErrorKind {
    Missing,
    Scalar,
}

enum StepIndex {
    Key(usize),
    Index(usize),
}

fn step<'tree>(node: &'tree Value, segment: &str) -> Result<&'tree Value, StepErrorKind> {
    match node {
        Value::Map(map) => map.get(segment).ok_or(StepErrorKind::Missing),
        Value::Seq(items) => match find_element(items, segment) {
            Some(index) => Ok(&items[index]),
            None => Err(StepErrorKind::Missing),
        },
        _ => Err(StepErrorKind::Scalar),
    }
}

fn step_index(node: &Value, segment: &str) -> Result<StepIndex, StepErrorKind> {
    match node {
        Value::Map(map) => match map.entries.iter().position(|(k, _)| k == segment) {
            Some(index) => Ok(StepIndex::Key(index)),
            None => Err(StepErrorKind::Missing),
        },
        Value::Seq(items) => match find_element(items, segment) {
            Some(index) => Ok(StepIndex::Index(index)),
            None => Err(StepErrorKind::Missing),
        },
        _ => Err(StepErrorKind::Scalar),
    }
}

/// Locate a sequence element by index or by its `name`/`key`/`id` field.
fn find_element(items: &[Value], segment: &str) -> Option<usize> {
    if let Ok(index) = segment.parse::<usize>() {
        return if index < items.len() {
            Some(index)
        } else {
            None
        };
    }
    items.iter().position(|item| match item {
        Value::Map(map) => NAME_FIELDS.iter().any(|field| {
            map.get(field)
                .and_then(Value::render_scalar)
                .map_or(false, |rendered| rendered == segment)
        }),
        _ => false,
    })
}

fn glob_walk(
    node: &Value,
    segments: &[String],
    at: Cursor,
    matches: &mut Vec<Cursor>,
) -> Result<(), Error> {
    let segment = match segments.first() {
        Some(segment) => segment,
        None => {
            matches.push(at);
            return Ok(());
        }
    };

    if segment == "*" {
        match node {
            Value::Map(map) => {
                for (key, child) in map.iter() {
                    glob_walk(child, &segments[1..], at.child(key.clone()), matches)?;
                }
            }
            Value::Seq(items) => {
                for (index, child) in items.iter().enumerate() {
                    glob_walk(child, &segments[1..], at.child(index.to_string()), matches)?;
                }
            }
            _ => {}
        }
        return Ok(());
    }

    let cursor = at.child(segment.clone());
    match step(node, segment) {
        Ok(child) => glob_walk(child, &segments[1..], cursor, matches),
        Err(StepErrorKind::Missing) => Err(Error::not_found(&cursor.segments().join("."))),
        Err(StepErrorKind::Scalar) => Err(Error::type_mismatch(
            &at.segments().join("."),
            "mapping or sequence",
            node.type_name(),
        )),
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                write!(f, ".")?;
            }
            if segment.contains('.') {
                write!(f, "[{}]", segment)?;
            } else {
                write!(f, "{}", segment)?;
            }
        }
        Ok(())
    }
}
