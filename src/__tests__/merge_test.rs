use super::doc;
use crate::{Engine, EngineOptions, Value};

fn merge(documents: Vec<Value>) -> Value {
    merge_with(documents, false)
}

fn merge_with(documents: Vec<Value>, fallback_append: bool) -> Value {
    let mut opts = EngineOptions::default();
    opts.skip_eval = true;
    opts.fallback_append = fallback_append;
    match Engine::new(opts).run(documents) {
        Ok(tree) => tree,
        Err(report) => panic!("merge failed:\n{}", report),
    }
}

#[test]
fn mapping_union_recurses_and_keeps_order() {
    let merged = merge(vec![
        doc(r#"{"a": {"x": 1, "y": 2}, "b": 1}"#),
        doc(r#"{"a": {"y": 20, "z": 30}, "c": 3}"#),
    ]);
    assert_eq!(merged, doc(r#"{"a": {"x": 1, "y": 20, "z": 30}, "b": 1, "c": 3}"#));
}

#[test]
fn merging_with_an_empty_mapping_is_identity() {
    let document = doc(r#"{"a": {"b": [1, 2]}, "c": "x"}"#);
    assert_eq!(merge(vec![document.clone(), doc("{}")]), document);
    assert_eq!(merge(vec![doc("{}"), document.clone()]), document);
}

#[test]
fn merge_is_idempotent_over_named_sequences() {
    let document = doc(r#"{"jobs": [{"name": "web", "instances": 1}, {"name": "db"}]}"#);
    assert_eq!(merge(vec![document.clone(), document.clone()]), document);
}

#[test]
fn sequences_pair_by_name() {
    let merged = merge(vec![
        doc(r#"{"jobs": [{"name": "web", "instances": 1}]}"#),
        doc(r#"{"jobs": [{"name": "web", "instances": 3}, {"name": "db", "instances": 1}]}"#),
    ]);
    assert_eq!(
        merged,
        doc(r#"{"jobs": [{"name": "web", "instances": 3}, {"name": "db", "instances": 1}]}"#)
    );
}

#[test]
fn unpaired_sequences_overwrite_by_default() {
    let merged = merge(vec![doc(r#"{"xs": [1, 2]}"#), doc(r#"{"xs": [3]}"#)]);
    assert_eq!(merged, doc(r#"{"xs": [3]}"#));
}

#[test]
fn fallback_append_concatenates_instead() {
    let merged = merge_with(vec![doc(r#"{"xs": [1, 2]}"#), doc(r#"{"xs": [3]}"#)], true);
    assert_eq!(merged, doc(r#"{"xs": [1, 2, 3]}"#));
}

#[test]
fn scalar_replaces_anything() {
    let merged = merge(vec![doc(r#"{"a": {"deep": true}}"#), doc(r#"{"a": 7}"#)]);
    assert_eq!(merged, doc(r#"{"a": 7}"#));
}

#[test]
fn sequence_directives() {
    let base = doc(r#"{"xs": [1, 2]}"#);

    let replaced = merge(vec![base.clone(), doc(r#"{"xs": ["(( replace ))", 9]}"#)]);
    assert_eq!(replaced, doc(r#"{"xs": [9]}"#));

    let appended = merge(vec![base.clone(), doc(r#"{"xs": ["(( append ))", 9]}"#)]);
    assert_eq!(appended, doc(r#"{"xs": [1, 2, 9]}"#));

    let prepended = merge(vec![base.clone(), doc(r#"{"xs": ["(( prepend ))", 9]}"#)]);
    assert_eq!(prepended, doc(r#"{"xs": [9, 1, 2]}"#));

    let inlined = merge(vec![
        doc(r#"{"xs": [{"a": 1}, {"b": 2}]}"#),
        doc(r#"{"xs": ["(( inline ))", {"a": 10}]}"#),
    ]);
    assert_eq!(inlined, doc(r#"{"xs": [{"a": 10}, {"b": 2}]}"#));
}

#[test]
fn merge_on_pairs_by_a_custom_key() {
    let merged = merge(vec![
        doc(r#"{"releases": [{"release": "a", "v": 1}, {"release": "b", "v": 1}]}"#),
        doc(r#"{"releases": ["(( merge on release ))", {"release": "b", "v": 9}]}"#),
    ]);
    assert_eq!(
        merged,
        doc(r#"{"releases": [{"release": "a", "v": 1}, {"release": "b", "v": 9}]}"#)
    );
}

#[test]
fn inject_splices_with_explicit_keys_winning() {
    let merged = merge(vec![doc(
        r#"{
            "templates": {"base": {"a": 1, "b": {"x": 1}}},
            "prod": {"use": "(( inject templates.base ))", "b": {"y": 2}}
        }"#,
    )]);

    assert_eq!(
        merged,
        doc(
            r#"{
                "templates": {"base": {"a": 1, "b": {"x": 1}}},
                "prod": {"b": {"y": 2, "x": 1}, "a": 1}
            }"#
        )
    );
}

#[test]
fn merge_is_associative_over_disjoint_top_level_keys() {
    let a = doc(r#"{"a": 1}"#);
    let b = doc(r#"{"b": {"x": 2}}"#);
    let c = doc(r#"{"c": [3]}"#);

    let left_first = merge(vec![merge(vec![a.clone(), b.clone()]), c.clone()]);
    let right_first = merge(vec![a, merge(vec![b, c])]);
    assert_eq!(left_first, right_first);
}

#[test]
fn inject_of_a_missing_reference_fails_fast() {
    let mut opts = EngineOptions::default();
    opts.skip_eval = true;
    let report = Engine::new(opts)
        .run(vec![doc(r#"{"a": "(( inject nowhere ))"}"#)])
        .unwrap_err();
    assert_eq!(report.len(), 1);
    assert!(report.to_string().contains("could not be found"));
}
