use super::doc;
use crate::{cherry_pick, cycle_check, prune, ErrorKind};

#[test]
fn prune_removes_nested_paths() {
    let mut tree = doc(r#"{"a": {"b": 1, "c": 2}, "d": 3}"#);
    prune(&mut tree, &["a.b".to_string(), "d".to_string()]).unwrap();
    assert_eq!(tree, doc(r#"{"a": {"c": 2}}"#));
}

#[test]
fn prune_of_a_missing_path_is_identity() {
    let mut tree = doc(r#"{"a": 1}"#);
    prune(&mut tree, &["nope.deep".to_string()]).unwrap();
    assert_eq!(tree, doc(r#"{"a": 1}"#));
}

#[test]
fn prune_removes_list_elements_by_name() {
    let mut tree = doc(r#"{"jobs": [{"name": "web"}, {"name": "db"}]}"#);
    prune(&mut tree, &["jobs.web".to_string()]).unwrap();
    assert_eq!(tree, doc(r#"{"jobs": [{"name": "db"}]}"#));
}

#[test]
fn cherry_pick_projects_in_list_order() {
    let tree = doc(r#"{"a": {"x": 1}, "b": 2, "c": 3}"#);
    let picked = cherry_pick(&tree, &["c".to_string(), "a.x".to_string()]).unwrap();
    assert_eq!(picked, doc(r#"{"c": 3, "a": {"x": 1}}"#));
}

#[test]
fn cherry_pick_twice_is_identity() {
    let tree = doc(r#"{"a": {"x": 1}, "b": 2}"#);
    let paths = vec!["a".to_string()];
    let once = cherry_pick(&tree, &paths).unwrap();
    let twice = cherry_pick(&once, &paths).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn cherry_pick_missing_path_fails_with_the_narrowest_prefix() {
    let tree = doc(r#"{"a": 1}"#);
    let err = cherry_pick(&tree, &["not.there".to_string()]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(
        err.message,
        "$.not could not be found in the datastructure"
    );
}

#[test]
fn cycle_check_passes_ordinary_trees() {
    let tree = doc(r#"{"a": {"b": [1, {"c": 2}]}}"#);
    cycle_check(&tree, 4096).unwrap();
}

#[test]
fn cycle_check_fails_closed_on_depth_exhaustion() {
    let tree = doc(r#"{"a": {"b": {"c": {"d": 1}}}}"#);
    let err = cycle_check(&tree, 2).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cycle);
    assert_eq!(err.message, "self-referencing dataset");
}
