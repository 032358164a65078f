//! The merger: folds parsed documents into one tree, document order.
//!
//! Mappings union key-wise; sequences pair by `name`/`key`/`id` when they can,
//! with an explicit directive element overriding the strategy; a scalar on either
//! side is replaced by the right hand side. Merge-phase operator calls run
//! immediately against the partially merged tree, which is what lets `inject`
//! splice a referenced mapping into its parent while later keys still override.

use crate::analysis::expression_source;
use crate::cursor::NAME_FIELDS;
use crate::eval::{apply_response, invoke_with};
use crate::memo::parse_cached;
use crate::registry::Registry;
use crate::{
    Cursor, EngineOptions, Error, ErrorKind, Map, OpContext, OperatorCall, Phase, Runtime, Value,
};

/// Safety margin for inject chains which keep producing new merge-phase calls.
const MAX_MERGE_ROUNDS: usize = 64;

pub(crate) struct Merger<'m> {
    pub opts: &'m EngineOptions,
    pub runtime: &'m Runtime,
}

impl Merger<'_> {
    /// Fold the documents left to right. The merger fails fast: the first
    /// structural error aborts the fold.
    pub fn fold(&self, documents: Vec<Value>) -> Result<Value, Error> {
        let mut acc = Value::Map(Map::new());
        for (index, document) in documents.into_iter().enumerate() {
            log::debug!("merging document #{}", index + 1);
            acc = self.merge_values(acc, document)?;
            self.run_merge_phase(&mut acc)?;
        }
        Ok(acc)
    }

    fn merge_values(&self, acc: Value, incoming: Value) -> Result<Value, Error> {
        match (acc, incoming) {
            (Value::Map(a), Value::Map(b)) => self.merge_maps(a, b).map(Value::Map),
            (Value::Seq(a), Value::Seq(b)) => self.merge_seqs(a, b),
            // Scalars and mismatched shapes: the right hand side wins.
            (_, incoming) => Ok(incoming),
        }
    }

    fn merge_maps(&self, mut acc: Map, incoming: Map) -> Result<Map, Error> {
        for (key, value) in incoming.entries {
            // A key present on both sides merges in place, keeping its original
            // position; new keys append in their own order.
            match acc.entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, slot)) => {
                    let existing = std::mem::replace(slot, Value::Null);
                    *slot = self.merge_values(existing, value)?;
                }
                None => acc.entries.push((key, value)),
            }
        }
        Ok(acc)
    }

    fn merge_seqs(&self, acc: Vec<Value>, incoming: Vec<Value>) -> Result<Value, Error> {
        if let Some((directive, rest)) = sequence_directive(&incoming) {
            return self.apply_directive(acc, directive, rest);
        }

        if identifiable(&acc) && identifiable(&incoming) {
            return self
                .inline_by_name(acc, incoming, None)
                .map(Value::Seq);
        }

        if self.opts.fallback_append {
            let mut joined = acc;
            joined.extend(incoming);
            return Ok(Value::Seq(joined));
        }

        Ok(Value::Seq(incoming))
    }

    fn apply_directive(
        &self,
        mut acc: Vec<Value>,
        directive: Directive,
        rest: Vec<Value>,
    ) -> Result<Value, Error> {
        match directive {
            Directive::Replace => Ok(Value::Seq(rest)),
            Directive::Append => {
                acc.extend(rest);
                Ok(Value::Seq(acc))
            }
            Directive::Prepend => {
                let mut joined = rest;
                joined.extend(acc);
                Ok(Value::Seq(joined))
            }
            Directive::Inline => {
                let mut merged = Vec::new();
                let mut incoming = rest.into_iter();
                let mut existing = acc.into_iter();
                loop {
                    match (existing.next(), incoming.next()) {
                        (Some(a), Some(b)) => merged.push(self.merge_values(a, b)?),
                        (Some(a), None) => merged.push(a),
                        (None, Some(b)) => merged.push(b),
                        (None, None) => break,
                    }
                }
                Ok(Value::Seq(merged))
            }
            Directive::MergeOn(key) => self
                .inline_by_name(acc, rest, key.as_deref())
                .map(Value::Seq),
        }
    }

    /// Pair elements by their identifying field, merging pairs and keeping the
    /// accumulated order; unmatched incoming elements are appended in their own
    /// order.
    fn inline_by_name(
        &self,
        acc: Vec<Value>,
        incoming: Vec<Value>,
        key: Option<&str>,
    ) -> Result<Vec<Value>, Error> {
        let mut taken: Vec<bool> = vec![false; incoming.len()];
        let mut incoming: Vec<Option<Value>> = incoming.into_iter().map(Some).collect();
        let mut merged = Vec::with_capacity(acc.len());

        for element in acc {
            let id = identity(&element, key);
            let matched = id.as_ref().and_then(|id| {
                incoming.iter().enumerate().position(|(index, candidate)| {
                    !taken[index]
                        && candidate
                            .as_ref()
                            .map_or(false, |candidate| identity(candidate, key).as_ref() == Some(id))
                })
            });
            match matched {
                Some(index) => {
                    taken[index] = true;
                    let candidate = incoming[index].take().expect("untaken candidate");
                    merged.push(self.merge_values(element, candidate)?);
                }
                None => merged.push(element),
            }
        }

        merged.extend(incoming.into_iter().flatten());
        Ok(merged)
    }

    /// Execute merge-phase operator calls against the partially merged tree until
    /// none remain.
    fn run_merge_phase(&self, tree: &mut Value) -> Result<(), Error> {
        for _ in 0..MAX_MERGE_ROUNDS {
            let calls = find_merge_calls(tree);
            if calls.is_empty() {
                return Ok(());
            }
            for (cursor, call, source) in calls {
                let response = {
                    let (op, _) = Registry::global().bind(&call.name);
                    let ctx = OpContext {
                        tree,
                        here: &cursor,
                        source: &source,
                        raw_args: &[],
                        target: None,
                        modifiers: &[],
                        runtime: self.runtime,
                    };
                    invoke_with(&*op, &call, &ctx)
                }
                .map_err(|err| annotate(err, &cursor, &source))?;
                apply_response(tree, &cursor, response)
                    .map_err(|err| annotate(err, &cursor, &source))?;
            }
        }
        Err(Error::new(
            ErrorKind::Cycle,
            "merge operators kept producing new work and did not settle".to_string(),
        ))
    }
}

fn annotate(mut err: Error, cursor: &Cursor, source: &str) -> Error {
    if err.path.is_none() {
        err.path = Some(cursor.to_string());
    }
    if err.snippet.is_none() {
        err.snippet = Some(source.to_string());
    }
    err
}

/// Splice an injected mapping into `parent`, dropping the key which held the
/// call. Keys the parent already spells out override injected ones, mappings
/// merging recursively.
pub(crate) fn inject_into(parent: &mut Map, key: &str, injected: &Map) {
    parent.remove(key);
    for (name, value) in injected.iter() {
        match parent.get_mut(name) {
            None => {
                parent.insert(name.clone(), value.clone());
            }
            Some(existing) => fill_missing(existing, value),
        }
    }
}

fn fill_missing(existing: &mut Value, injected: &Value) {
    if let (Value::Map(existing), Value::Map(injected)) = (existing, injected) {
        for (name, value) in injected.iter() {
            match existing.get_mut(name) {
                None => {
                    existing.insert(name.clone(), value.clone());
                }
                Some(slot) => fill_missing(slot, value),
            }
        }
    }
}

enum Directive {
    Replace,
    Append,
    Prepend,
    Inline,
    MergeOn(Option<String>),
}

/// Recognize a `(( directive ))` first element of an incoming sequence.
fn sequence_directive(incoming: &[Value]) -> Option<(Directive, Vec<Value>)> {
    let first = match incoming.first() {
        Some(Value::String(text)) => expression_source(text)?,
        _ => return None,
    };
    let words: Vec<&str> = first.split_whitespace().collect();
    let directive = match words.as_slice() {
        ["replace"] => Directive::Replace,
        ["append"] => Directive::Append,
        ["prepend"] => Directive::Prepend,
        ["inline"] => Directive::Inline,
        ["merge"] => Directive::MergeOn(None),
        ["merge", "on", key] => Directive::MergeOn(Some((*key).to_string())),
        _ => return None,
    };
    Some((directive, incoming[1..].to_vec()))
}

/// Every element is a mapping carrying one of the identifying fields.
fn identifiable(elements: &[Value]) -> bool {
    !elements.is_empty() && elements.iter().all(|element| identity(element, None).is_some())
}

/// The identity of a sequence element: the value of the requested field, or the
/// first of `name`/`key`/`id` that is present.
fn identity(element: &Value, key: Option<&str>) -> Option<String> {
    let map = element.as_map()?;
    match key {
        Some(key) => map.get(key).and_then(Value::render_scalar),
        None => NAME_FIELDS
            .iter()
            .find_map(|field| map.get(field).and_then(Value::render_scalar)),
    }
}

/// Discover merge-phase operator calls, pre-order.
fn find_merge_calls(tree: &Value) -> Vec<(Cursor, OperatorCall, String)> {
    let mut calls = Vec::new();
    collect_merge_calls(tree, Cursor::root(), &mut calls);
    calls
}

fn collect_merge_calls(node: &Value, at: Cursor, calls: &mut Vec<(Cursor, OperatorCall, String)>) {
    match node {
        Value::String(text) => {
            let inner = match expression_source(text) {
                Some(inner) => inner,
                None => return,
            };
            let parsed = match parse_cached(inner, Registry::global()) {
                Ok(parsed) => parsed,
                // Analysis reports malformed expressions later, with positions.
                Err(_) => return,
            };
            if let Some(call) = parsed.expr.as_ref().and_then(|expr| expr.as_call()) {
                let (_, info) = Registry::global().bind(&call.name);
                if info.phase == Phase::Merge {
                    calls.push((at, call.clone(), text.clone()));
                }
            }
        }
        Value::Seq(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_merge_calls(item, at.child(index.to_string()), calls);
            }
        }
        Value::Map(map) => {
            for (key, value) in map.iter() {
                collect_merge_calls(value, at.child(key.clone()), calls);
            }
        }
        _ => {}
    }
}
