use super::doc;
use crate::diff::{diff, DiffKind};
use crate::tree::split_documents;
use crate::{parse_cached, parse_metrics, pattern_report, Value};
use std::sync::Arc;

#[test]
fn multi_document_streams_split_on_separator_lines() {
    let text = "{\"a\": 1}\n---\n{\"b\": 2}\n---\n{\"c\": 3}";
    assert_eq!(split_documents(text).len(), 3);

    let documents = Value::from_json_multi(text).unwrap();
    assert_eq!(documents.len(), 3);
    assert_eq!(documents[1], doc(r#"{"b": 2}"#));
}

#[test]
fn json_round_trip_preserves_key_order() {
    let tree = doc(r#"{"z": 1, "a": {"m": 2, "b": 3}}"#);
    let rendered = tree.to_json();
    let z = rendered.find("\"z\"").unwrap();
    let a = rendered.find("\"a\"").unwrap();
    assert!(z < a, "key order lost: {}", rendered);
    assert_eq!(Value::from_json(&rendered).unwrap(), tree);
}

#[test]
fn numbers_keep_their_tags() {
    let tree = doc(r#"{"i": 3, "f": 3.5}"#);
    assert_eq!(
        tree,
        Value::Map(
            [
                ("i".to_string(), Value::Int(3)),
                ("f".to_string(), Value::Float(3.5)),
            ]
            .into_iter()
            .collect()
        )
    );
}

#[test]
fn diff_lists_changed_added_and_removed_paths() {
    let left = doc(r#"{"a": 1, "b": {"x": 1}, "gone": true}"#);
    let right = doc(r#"{"a": 2, "b": {"x": 1, "y": 3}}"#);

    let entries = diff(&left, &right);
    let find = |path: &str| entries.iter().find(|entry| entry.path == path);

    assert_eq!(find("a").unwrap().kind, DiffKind::Changed);
    assert_eq!(find("b.y").unwrap().kind, DiffKind::Added);
    assert_eq!(find("gone").unwrap().kind, DiffKind::Removed);
    assert!(find("b.x").is_none());

    assert!(diff(&left, &left).is_empty());
}

#[test]
fn parse_memoization_returns_the_cached_tree() {
    let registry = crate::registry::Registry::global();
    let source = "concat \"memo-probe\" meta.host";

    let first = parse_cached(source, registry).unwrap();
    let hits_before = parse_metrics().hits;
    let second = parse_cached(source, registry).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(parse_metrics().hits > hits_before);
}

#[test]
fn pattern_tracker_normalizes_literals() {
    let registry = crate::registry::Registry::global();
    parse_cached("concat \"pattern-probe\" 12345", registry).unwrap();

    let shapes = pattern_report(1000);
    assert!(shapes.iter().any(|(shape, _)| shape == "concat S N"));
}
