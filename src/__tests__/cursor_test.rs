use super::doc;
use crate::{Cursor, ErrorKind, Value};

#[test]
fn dotted_path_resolution() {
    let tree = doc(r#"{"a": {"b": 42}}"#);

    let rooted = Cursor::parse("$.a.b").unwrap();
    assert_eq!(rooted.resolve(&tree).unwrap(), &Value::Int(42));

    let bare = Cursor::parse("a.b").unwrap();
    assert_eq!(bare.resolve(&tree).unwrap(), &Value::Int(42));
}

#[test]
fn bracket_segment_keeps_dots() {
    let tree = doc(r#"{"a": {"b.c": 1}}"#);
    let cursor = Cursor::parse("a.[b.c]").unwrap();
    assert_eq!(cursor.segments(), &["a".to_string(), "b.c".to_string()]);
    assert_eq!(cursor.resolve(&tree).unwrap(), &Value::Int(1));
}

#[test]
fn unmatched_bracket_is_a_syntax_error() {
    let err = Cursor::parse("a]b").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    let err = Cursor::parse("a[b").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn list_lookup_by_name_field() {
    let tree = doc(r#"{"xs": [{"name": "name", "v": 1}]}"#);
    let cursor = Cursor::parse("xs.name").unwrap();
    let element = cursor.resolve(&tree).unwrap();
    assert_eq!(element, &doc(r#"{"name": "name", "v": 1}"#));
}

#[test]
fn list_lookup_by_index_and_key_and_id() {
    let tree = doc(r#"{"xs": [{"key": "first"}, {"id": "second"}]}"#);
    assert!(Cursor::parse("xs.0").unwrap().resolve(&tree).is_ok());
    assert!(Cursor::parse("xs.first").unwrap().resolve(&tree).is_ok());
    assert!(Cursor::parse("xs.second").unwrap().resolve(&tree).is_ok());
}

#[test]
fn not_found_carries_the_narrowest_prefix() {
    let tree = doc(r#"{"a": {"b": 1}}"#);
    let err = Cursor::parse("a.x.y").unwrap().resolve(&tree).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(
        err.message.contains("$.a.x"),
        "expected the narrowest prefix in: {}",
        err.message
    );
}

#[test]
fn scalar_in_the_middle_is_a_type_mismatch() {
    let tree = doc(r#"{"a": 1}"#);
    let err = Cursor::parse("a.b").unwrap().resolve(&tree).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn glob_expands_keys_and_indices() {
    let tree = doc(r#"{"jobs": [{"name": "web"}, {"name": "db"}]}"#);
    let matches = Cursor::parse("jobs.*.name").unwrap().glob(&tree).unwrap();
    let rendered: Vec<String> = matches.iter().map(|c| c.to_string()).collect();
    assert_eq!(rendered, vec!["jobs.0.name", "jobs.1.name"]);
}

#[test]
fn canonicalize_rewrites_names_to_indices() {
    let tree = doc(r#"{"jobs": [{"name": "web"}, {"name": "db"}]}"#);
    let cursor = Cursor::parse("jobs.db.name").unwrap();
    assert_eq!(cursor.canonicalize(&tree).to_string(), "jobs.1.name");
}

#[test]
fn display_round_trips() {
    for path in ["a.b.c", "jobs.0.name", "a.[b.c].d"] {
        let cursor = Cursor::parse(path).unwrap();
        let reparsed = Cursor::parse(&cursor.to_string()).unwrap();
        assert_eq!(cursor, reparsed);
    }
    assert_eq!(Cursor::parse("$").unwrap().to_string(), "$");
}

#[test]
fn set_and_remove() {
    let mut tree = doc(r#"{"a": {"b": 1}}"#);
    Cursor::parse("a.b")
        .unwrap()
        .set(&mut tree, Value::Int(7))
        .unwrap();
    assert_eq!(
        Cursor::parse("a.b").unwrap().resolve(&tree).unwrap(),
        &Value::Int(7)
    );

    let removed = Cursor::parse("a.b").unwrap().remove(&mut tree).unwrap();
    assert_eq!(removed, Some(Value::Int(7)));
    let missing = Cursor::parse("a.b").unwrap().remove(&mut tree).unwrap();
    assert_eq!(missing, None);
}
