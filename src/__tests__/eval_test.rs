use super::doc;
use crate::{Cursor, DataflowOrder, Engine, EngineOptions, ErrorKind, Report, Value};

fn run(json: &str) -> Value {
    run_with(json, EngineOptions::default())
}

fn run_with(json: &str, opts: EngineOptions) -> Value {
    match Engine::new(opts).run(vec![doc(json)]) {
        Ok(tree) => tree,
        Err(report) => panic!("evaluation failed:\n{}", report),
    }
}

fn run_err(json: &str) -> Report {
    Engine::new(EngineOptions::default())
        .run(vec![doc(json)])
        .unwrap_err()
}

fn at(tree: &Value, path: &str) -> Value {
    Cursor::parse(path).unwrap().resolve(tree).unwrap().clone()
}

#[test]
fn analysis_binds_opcalls_with_canonical_paths_and_reads() {
    let tree = doc(
        r#"{
            "meta": {"x": 1},
            "v": "(( grab meta.x ))",
            "w": "(( grab v ))"
        }"#,
    );
    let opcalls = crate::analysis::analyze(&tree, crate::registry::Registry::global()).unwrap();
    assert_eq!(opcalls.len(), 2);
    assert_eq!(opcalls[0].canonical.to_string(), "v");
    assert_eq!(opcalls[0].reads[0].to_string(), "meta.x");
    assert_eq!(opcalls[1].canonical.to_string(), "w");

    let graph = crate::analysis::DependencyGraph::build(&opcalls);
    assert!(graph.producers_of(0).is_empty());
    assert_eq!(graph.producers_of(1), &[0]);
    assert_eq!(graph.consumers_of(0), &[1]);
}

#[test]
fn simple_grab() {
    let tree = run(r#"{"meta": {"x": 1}, "value": "(( grab meta.x ))"}"#);
    assert_eq!(at(&tree, "value"), Value::Int(1));
}

#[test]
fn logical_or_default() {
    let tree = run(r#"{"value": "(( grab missing.key || \"default\" ))"}"#);
    assert_eq!(at(&tree, "value"), Value::String("default".into()));
}

#[test]
fn nested_concat() {
    let tree = run(r#"{"a": "hello", "b": "world", "c": "(( concat a \"-\" b ))"}"#);
    assert_eq!(at(&tree, "c"), Value::String("hello-world".into()));
}

#[test]
fn chained_dependencies_resolve_in_order() {
    let tree = run(
        r#"{
            "a": 1,
            "b": "(( grab a ))",
            "c": "(( grab b ))",
            "d": "(( concat \"v=\" c ))"
        }"#,
    );
    assert_eq!(at(&tree, "c"), Value::Int(1));
    assert_eq!(at(&tree, "d"), Value::String("v=1".into()));
}

#[test]
fn grab_of_a_subtree_waits_for_its_opcalls() {
    let tree = run(
        r#"{
            "meta": {"n": "(( calc \"2 + 3\" ))"},
            "copy": "(( grab meta ))"
        }"#,
    );
    assert_eq!(at(&tree, "copy.n"), Value::Int(5));
}

#[test]
fn cycle_reports_every_survivor() {
    let report = run_err(r#"{"a": "(( grab b ))", "b": "(( grab a ))"}"#);
    assert_eq!(report.len(), 2, "got:\n{}", report);
    for error in report.errors() {
        assert_eq!(error.kind, ErrorKind::Cycle);
    }
    assert!(report.to_string().starts_with("2 error(s) detected:"));
}

#[test]
fn direct_self_reference_is_a_cycle() {
    let report = run_err(r#"{"a": "(( grab a ))"}"#);
    assert_eq!(report.errors()[0].kind, ErrorKind::Cycle);
}

#[test]
fn round_errors_aggregate() {
    let report = run_err(
        r#"{
            "a": "(( grab missing.one ))",
            "b": "(( grab missing.two ))"
        }"#,
    );
    assert_eq!(report.len(), 2, "got:\n{}", report);
}

#[test]
fn arithmetic_and_ternary() {
    let tree = run(
        r#"{
            "n": "(( 1 + 2 * 3 ))",
            "flag": "(( 2 > 1 ))",
            "pick": "(( 2 > 1 ? \"big\" : \"small\" ))"
        }"#,
    );
    assert_eq!(at(&tree, "n"), Value::Int(7));
    assert_eq!(at(&tree, "flag"), Value::Bool(true));
    assert_eq!(at(&tree, "pick"), Value::String("big".into()));
}

#[test]
fn calc_parses_its_formula() {
    let tree = run(r#"{"meta": {"n": 3}, "v": "(( calc \"2 * meta.n + 1\" ))"}"#);
    assert_eq!(at(&tree, "v"), Value::Int(7));
}

#[test]
fn calc_waits_for_computed_references() {
    // The formula reads `b`, which is itself an opcall: the embedded reference
    // must put an edge behind the grab so calc never sees the unresolved text.
    let tree = run(
        r#"{
            "a": 1,
            "b": "(( grab a ))",
            "v": "(( calc \"2 * b + 3\" ))"
        }"#,
    );
    assert_eq!(at(&tree, "b"), Value::Int(1));
    assert_eq!(at(&tree, "v"), Value::Int(5));

    let opcalls = crate::analysis::analyze(
        &doc(r#"{"b": "(( grab a ))", "v": "(( calc \"2 * b + 3\" ))"}"#),
        crate::registry::Registry::global(),
    )
    .unwrap();
    let graph = crate::analysis::DependencyGraph::build(&opcalls);
    assert_eq!(graph.producers_of(1), &[0]);
}

#[test]
fn division_semantics() {
    let tree = run(r#"{"a": "(( 4 / 2 ))", "b": "(( 1 / 2 ))"}"#);
    assert_eq!(at(&tree, "a"), Value::Int(2));
    assert_eq!(at(&tree, "b"), Value::Float(0.5));

    let report = run_err(r#"{"a": "(( 1 / 0 ))"}"#);
    assert!(report.to_string().contains("division by zero"));
}

#[test]
fn environment_variables() {
    std::env::set_var("GRAFT_TEST_ENV", "from-env");
    let tree = run(
        r#"{
            "direct": "(( $GRAFT_TEST_ENV ))",
            "op": "(( env \"GRAFT_TEST_ENV\" ))",
            "missing": "(( concat \"x\" $GRAFT_TEST_ENV_MISSING ))"
        }"#,
    );
    assert_eq!(at(&tree, "direct"), Value::String("from-env".into()));
    assert_eq!(at(&tree, "op"), Value::String("from-env".into()));
    // A missing environment variable reads as the empty string.
    assert_eq!(at(&tree, "missing"), Value::String("x".into()));
}

#[test]
fn grab_several_arguments_collects_a_sequence() {
    let tree = run(r#"{"a": 1, "b": [2, 3], "all": "(( grab a b ))"}"#);
    assert_eq!(at(&tree, "all"), doc("[1, 2, 3]"));
}

#[test]
fn join_keys_sort_empty() {
    let tree = run(
        r#"{
            "m": {"z": 1, "a": 2},
            "keys": "(( keys m ))",
            "joined": "(( join \", \" (grab keys) ))",
            "sorted": "(( sort (grab keys) ))",
            "nothing": "(( empty hash ))"
        }"#,
    );
    assert_eq!(at(&tree, "keys"), doc(r#"["z", "a"]"#));
    assert_eq!(at(&tree, "joined"), Value::String("z, a".into()));
    assert_eq!(at(&tree, "sorted"), doc(r#"["a", "z"]"#));
    assert_eq!(at(&tree, "nothing"), doc("{}"));
}

#[test]
fn sort_by_field() {
    let tree = run(
        r#"{
            "jobs": [{"name": "web"}, {"name": "db"}],
            "ordered": "(( sort (grab jobs) \"name\" ))"
        }"#,
    );
    assert_eq!(
        at(&tree, "ordered"),
        doc(r#"[{"name": "db"}, {"name": "web"}]"#)
    );
}

#[test]
fn negate_and_not() {
    let tree = run(r#"{"flag": false, "a": "(( negate flag ))", "b": "(( ! flag ))"}"#);
    assert_eq!(at(&tree, "a"), Value::Bool(true));
    assert_eq!(at(&tree, "b"), Value::Bool(true));
}

#[test]
fn stringify_renders_a_subtree() {
    let tree = run(r#"{"m": {"a": 1}, "s": "(( stringify m ))"}"#);
    match at(&tree, "s") {
        Value::String(text) => assert!(text.contains("\"a\": 1")),
        other => panic!("expected a string, got {:?}", other),
    }
}

#[test]
fn defer_re_emits_the_expression() {
    let tree = run(r#"{"later": "(( defer grab a || \"x\" ))"}"#);
    assert_eq!(
        at(&tree, "later"),
        Value::String("(( grab a || \"x\" ))".into())
    );
}

#[test]
fn param_survivors_fail_the_run() {
    let report = run_err(r#"{"password": "(( param \"db password\" ))"}"#);
    assert_eq!(report.len(), 1);
    assert!(
        report.to_string().contains("db password is a required parameter"),
        "got:\n{}",
        report
    );
}

#[test]
fn param_overridden_by_a_later_document_is_fine() {
    let tree = Engine::new(EngineOptions::default())
        .run(vec![
            doc(r#"{"password": "(( param \"db password\" ))"}"#),
            doc(r#"{"password": "hunter2"}"#),
        ])
        .unwrap();
    assert_eq!(at(&tree, "password"), Value::String("hunter2".into()));
}

#[test]
fn prune_operator_removes_its_position() {
    let tree = run(r#"{"keep": 1, "temp": "(( prune ))"}"#);
    assert_eq!(tree, doc(r#"{"keep": 1}"#));
}

#[test]
fn static_ips_selects_from_the_network_pool() {
    let tree = run(
        r#"{
            "networks": [
                {"name": "net1", "subnets": [{"static": ["10.0.0.2 - 10.0.0.10"]}]}
            ],
            "jobs": [
                {"name": "web", "instances": 2,
                 "networks": [{"name": "net1", "static_ips": "(( static_ips 0 2 4 ))"}]}
            ]
        }"#,
    );
    assert_eq!(
        at(&tree, "jobs.0.networks.0.static_ips"),
        doc(r#"["10.0.0.2", "10.0.0.4"]"#)
    );
}

#[test]
fn ips_computes_offsets() {
    let tree = run(
        r#"{
            "one": "(( ips \"10.0.0.5\" 3 ))",
            "range": "(( ips \"10.0.0.0/24\" 10 2 ))"
        }"#,
    );
    assert_eq!(at(&tree, "one"), Value::String("10.0.0.8".into()));
    assert_eq!(at(&tree, "range"), doc(r#"["10.0.0.10", "10.0.0.11"]"#));
}

#[test]
fn redacted_vault_records_the_reference() {
    let mut opts = EngineOptions::default();
    opts.redact = true;
    let engine = Engine::new(opts);
    let tree = engine
        .run(vec![doc(r#"{"pw": "(( vault \"secret/db:password\" ))"}"#)])
        .unwrap();
    assert_eq!(at(&tree, "pw"), Value::String("REDACTED".into()));
    assert_eq!(engine.secrets(), vec!["secret/db:password".to_string()]);
}

#[test]
fn wrong_phase_calls_stay_textual() {
    // An eval-run tree should never see a merge-phase opcall; one discovered
    // post-merge is left as its sentinel text... unless merge already ran it.
    // `inject` executes during merge, so exercise the sentinel with a synthetic
    // second pass: a deferred param survives as text inside a skip-eval run.
    let mut opts = EngineOptions::default();
    opts.skip_eval = true;
    let tree = Engine::new(opts)
        .run(vec![doc(r#"{"p": "(( param \"x\" ))"}"#)])
        .unwrap();
    assert_eq!(at(&tree, "p"), Value::String("(( param \"x\" ))".into()));
}

#[test]
fn depth_first_matches_breadth_first_results() {
    let json = r#"{
        "a": 1,
        "b": "(( grab a ))",
        "c": "(( concat \"x\" (grab b) ))",
        "d": "(( grab c || \"fallback\" ))"
    }"#;

    let mut depth = EngineOptions::default();
    depth.depth_first = true;
    let mut insertion = EngineOptions::default();
    insertion.dataflow_order = DataflowOrder::Insertion;

    let breadth_tree = run(json);
    assert_eq!(run_with(json, depth), breadth_tree);
    assert_eq!(run_with(json, insertion), breadth_tree);
}

#[test]
fn finished_documents_hold_only_literals() {
    let tree = run(
        r#"{
            "meta": {"x": "v"},
            "a": "(( grab meta.x ))",
            "b": "(( grab nope || \"d\" ))",
            "keep": "plain (( not an expression"
        }"#,
    );
    let rendered = tree.to_json();
    assert!(!rendered.contains("(( grab"), "unresolved: {}", rendered);
    // A string which is not wholly an expression is preserved verbatim.
    assert_eq!(
        at(&tree, "keep"),
        Value::String("plain (( not an expression".into())
    );
}

#[test]
fn engine_prune_and_cherry_pick_options() {
    let mut opts = EngineOptions::default();
    opts.prune = vec!["meta".to_string()];
    let tree = run_with(r#"{"meta": {"x": 1}, "v": "(( grab meta.x ))"}"#, opts);
    assert_eq!(tree, doc(r#"{"v": 1}"#));

    let mut opts = EngineOptions::default();
    opts.cherry_pick = vec!["v".to_string()];
    let tree = run_with(r#"{"meta": {"x": 1}, "v": "(( grab meta.x ))"}"#, opts);
    assert_eq!(tree, doc(r#"{"v": 1}"#));
}

#[test]
fn cherry_pick_of_a_missing_path_is_scenario_six() {
    let mut opts = EngineOptions::default();
    opts.cherry_pick = vec!["not.there".to_string()];
    let report = Engine::new(opts).run(vec![doc(r#"{"a": 1}"#)]).unwrap_err();
    assert_eq!(
        report.to_string().trim(),
        "1 error(s) detected:\n - $.not could not be found in the datastructure"
    );
}
