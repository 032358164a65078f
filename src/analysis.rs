//! Discovery of the opcalls embedded in a merged tree.
//!
//! A string value which is wholly an `(( .. ))` expression becomes an [Opcall]
//! with the canonical cursor of its position and the transitive closure of the
//! cursors it reads. The walk is a stable pre-order: mapping keys in their
//! original document order, sequences in index order, which is also the
//! `insertion` dataflow order.

use crate::memo::parse_cached;
use crate::registry::Registry;
use crate::{Cursor, Expression, Opcall, Phase, Report, Value};
use once_cell::sync::Lazy;
use regex::Regex;

static EXPRESSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\(\((.*)\)\)$").unwrap());

/// The inner source when a string is wholly an `(( .. ))` expression.
pub(crate) fn expression_source(text: &str) -> Option<&str> {
    EXPRESSION
        .captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim())
}

/// Walk the merged tree and bind every embedded expression to an opcall.
pub(crate) fn analyze(tree: &Value, registry: &Registry) -> Result<Vec<Opcall>, Report> {
    let mut opcalls = Vec::new();
    let mut report = Report::new();
    walk(tree, Cursor::root(), &mut |cursor, text| {
        let inner = match expression_source(text) {
            Some(inner) => inner,
            None => return,
        };
        match parse_cached(inner, registry) {
            Ok(parsed) => {
                // An empty `(( ))` yields no opcall.
                if let Some(expr) = &parsed.expr {
                    opcalls.push(bind(tree, cursor, text, expr.clone(), registry));
                }
            }
            Err(parse_report) => {
                for error in parse_report.errors() {
                    report.push(error.clone().in_path(cursor.to_string()));
                }
            }
        }
    });

    report.into_result()?;
    log::debug!("analysis: {} opcall(s) discovered", opcalls.len());
    Ok(opcalls)
}

fn walk(node: &Value, at: Cursor, visit: &mut impl FnMut(Cursor, &str)) {
    match node {
        Value::String(text) => visit(at, text),
        Value::Seq(items) => {
            for (index, item) in items.iter().enumerate() {
                walk(item, at.child(index.to_string()), visit);
            }
        }
        Value::Map(map) => {
            for (key, value) in map.iter() {
                walk(value, at.child(key.clone()), visit);
            }
        }
        _ => {}
    }
}

/// Producer to consumer edges over a set of opcalls.
///
/// An edge runs from the opcall which writes a position to every opcall which
/// reads it; several consumers of one producer form a fan-out. Pre-computing the
/// edges keeps the scheduler's per-round readiness check linear in the edge
/// count.
pub(crate) struct DependencyGraph {
    producers: Vec<Vec<usize>>,
    consumers: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn build(opcalls: &[Opcall]) -> Self {
        let mut producers = vec![Vec::new(); opcalls.len()];
        let mut consumers = vec![Vec::new(); opcalls.len()];
        for (consumer, opcall) in opcalls.iter().enumerate() {
            for (producer, other) in opcalls.iter().enumerate() {
                if producer == consumer {
                    continue;
                }
                // A read into (or above) a position another opcall still has to
                // produce makes this opcall wait for it.
                if opcall
                    .reads
                    .iter()
                    .any(|read| other.canonical.overlaps(read))
                {
                    producers[consumer].push(producer);
                    consumers[producer].push(consumer);
                }
            }
        }
        Self {
            producers,
            consumers,
        }
    }

    /// The opcalls which must finish before `index` may run.
    pub fn producers_of(&self, index: usize) -> &[usize] {
        &self.producers[index]
    }

    /// The opcalls which read what `index` writes.
    pub fn consumers_of(&self, index: usize) -> &[usize] {
        &self.consumers[index]
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }
}

fn bind(
    tree: &Value,
    canonical: Cursor,
    source: &str,
    expr: Expression,
    registry: &Registry,
) -> Opcall {
    let (op, phase) = match expr.as_call() {
        Some(call) => {
            let (op, info) = registry.bind(&call.name);
            (Some(op), info.phase)
        }
        None => (None, Phase::Eval),
    };

    let mut reads = Vec::new();
    expr.walk(&mut |node| match node {
        Expression::Reference(cursor) => reads.push(cursor.canonicalize(tree)),
        Expression::Call(call) => {
            let (call_op, _) = registry.bind(&call.name);
            reads.extend(
                call_op
                    .dependencies(tree, &call.args, &canonical)
                    .into_iter()
                    .map(|cursor| cursor.canonicalize(tree)),
            );
        }
        _ => {}
    });
    reads.sort();
    reads.dedup();

    Opcall {
        canonical,
        expr,
        source: source.to_string(),
        op,
        phase,
        reads,
    }
}
