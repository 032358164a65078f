use crate::registry::Registry;
use crate::{BinaryOp, Cursor, Expression, ExpressionParser, Source, Value};

fn parse(text: &str) -> Expression {
    match ExpressionParser::new(Registry::global()).parse(&Source::new(text)) {
        Ok(Some(expr)) => expr,
        Ok(None) => panic!("`{}` parsed to nothing", text),
        Err(report) => panic!("`{}` failed to parse:\n{}", text, report),
    }
}

fn reference(path: &str) -> Expression {
    Expression::Reference(Cursor::parse(path).unwrap())
}

#[test]
fn empty_source_yields_no_expression() {
    let parsed = ExpressionParser::new(Registry::global())
        .parse(&Source::new("   "))
        .unwrap();
    assert!(parsed.is_none());
}

#[test]
fn operator_with_no_follow_on_is_a_reference() {
    assert_eq!(parse("grab"), reference("grab"));

    // A trailing operator word inside a call has no follow-on either.
    match parse("concat \"x\" grab") {
        Expression::Call(call) => {
            assert_eq!(call.args[1], reference("grab"));
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn reference_expecting_operators_take_a_cursor_first() {
    // grab declares reference-expecting arguments: its first argument is a
    // cursor even though `concat` names a registered operator.
    match parse("grab concat \"x\"") {
        Expression::Call(call) => {
            assert_eq!(call.name, "grab");
            assert_eq!(call.args.len(), 2);
            assert_eq!(call.args[0], reference("concat"));
        }
        other => panic!("expected a call, got {:?}", other),
    }

    // concat does not, so the same shape starts a nested call instead.
    match parse("concat grab \"x\"") {
        Expression::Call(call) => {
            assert_eq!(call.name, "concat");
            assert_eq!(call.args.len(), 1);
            match &call.args[0] {
                Expression::Call(inner) => {
                    assert_eq!(inner.name, "grab");
                    assert_eq!(
                        inner.args,
                        vec![Expression::Literal(Value::String("x".into()))]
                    );
                }
                other => panic!("expected a nested call, got {:?}", other),
            }
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn simple_call() {
    match parse("grab meta.x") {
        Expression::Call(call) => {
            assert_eq!(call.name, "grab");
            assert_eq!(call.args, vec![reference("meta.x")]);
            assert!(call.modifiers.is_empty());
            assert_eq!(call.target, None);
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn logical_or_splits_argument_lists() {
    // `grab a || grab b` is a LogicalOr of two one-argument calls, not one call
    // with four arguments.
    match parse("grab a || grab b") {
        Expression::Or(left, right) => {
            match (*left, *right) {
                (Expression::Call(first), Expression::Call(second)) => {
                    assert_eq!(first.args.len(), 1);
                    assert_eq!(second.args.len(), 1);
                }
                other => panic!("expected two calls, got {:?}", other),
            }
        }
        other => panic!("expected a logical or, got {:?}", other),
    }
}

#[test]
fn or_falls_back_to_a_literal() {
    match parse("grab missing.key || \"default\"") {
        Expression::Or(_, right) => {
            assert_eq!(*right, Expression::Literal(Value::String("default".into())));
        }
        other => panic!("expected a logical or, got {:?}", other),
    }
}

#[test]
fn modifiers_and_target_split_once() {
    match parse("vault:nocache:prefix@prod \"secret/x:y\"") {
        Expression::Call(call) => {
            assert_eq!(call.name, "vault");
            assert_eq!(call.modifiers, vec!["nocache", "prefix"]);
            assert_eq!(call.target.as_deref(), Some("prod"));
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn vault_choice_pipe_becomes_alternation() {
    match parse("vault \"secret/a:k\" | \"secret/b:k\"") {
        Expression::Or(left, right) => {
            assert!(matches!(*left, Expression::Call(_)));
            assert!(matches!(*right, Expression::Call(_)));
        }
        other => panic!("expected an alternation, got {:?}", other),
    }
}

#[test]
fn defer_keeps_its_arguments_verbatim() {
    match parse("defer grab a || \"x\"") {
        Expression::Call(call) => {
            assert_eq!(call.name, "defer");
            let words: Vec<&str> = call
                .args
                .iter()
                .map(|arg| match arg {
                    Expression::Literal(Value::String(word)) => word.as_str(),
                    other => panic!("expected a raw word, got {:?}", other),
                })
                .collect();
            assert_eq!(words, vec!["grab", "a", "||", "\"x\""]);
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn nested_calls_use_bare_parentheses() {
    match parse("concat \"a-\" (grab meta.x)") {
        Expression::Call(call) => {
            assert_eq!(call.name, "concat");
            assert!(matches!(call.args[1], Expression::Call(_)));
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn arithmetic_precedence() {
    match parse("1 + 2 * 3") {
        Expression::Operation { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                *right,
                Expression::Operation {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected an operation, got {:?}", other),
    }
}

#[test]
fn ternary_sits_at_or_level() {
    match parse("a == 1 ? \"yes\" : \"no\"") {
        Expression::Ternary { condition, .. } => {
            assert!(matches!(
                *condition,
                Expression::Operation {
                    op: BinaryOp::Eq,
                    ..
                }
            ));
        }
        other => panic!("expected a ternary, got {:?}", other),
    }
}

#[test]
fn unary_negate() {
    assert_matches::assert_matches!(parse("! a"), Expression::Not(_));
}

#[test]
fn render_then_parse_is_identity() {
    for source in [
        "grab meta.x",
        "concat \"a-\" (grab meta.x)",
        "grab a.b || \"fallback\"",
        "1 + 2 * meta.n",
        "a == 1 ? \"yes\" : \"no\"",
        "vault:nocache@prod \"secret/x:y\"",
    ] {
        let first = parse(source);
        let rendered = first.to_string();
        let second = parse(&rendered);
        assert_eq!(first, second, "render broke `{}` -> `{}`", source, rendered);
    }
}

#[test]
fn first_error_surfaces_by_default() {
    let report = ExpressionParser::new(Registry::global())
        .parse(&Source::new("grab ,"))
        .unwrap_err();
    assert_eq!(report.len(), 1);
}

#[test]
fn collecting_parser_synchronizes_and_reports_several() {
    let report = ExpressionParser::new(Registry::global())
        .collecting(4)
        .parse(&Source::new("grab , grab , grab ,"))
        .unwrap_err();
    assert!(
        report.len() >= 2,
        "expected several errors, got:\n{}",
        report
    );
    assert!(report.to_string().contains("error(s) detected"));
}

#[test]
fn errors_carry_positions() {
    let report = ExpressionParser::new(Registry::global())
        .parse(&Source::new("concat \"a\" ,"))
        .unwrap_err();
    let error = &report.errors()[0];
    assert!(error.position.is_some());
    assert!(error.snippet.is_some());
}
