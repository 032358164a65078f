use crate::registry::Registry;
use crate::{tokenize, Source, TokenKind};

fn kinds(text: &str) -> Vec<TokenKind> {
    tokenize(&Source::new(text), Registry::global())
        .unwrap()
        .iter()
        .map(|token| token.kind)
        .collect()
}

fn texts(text: &str) -> Vec<String> {
    tokenize(&Source::new(text), Registry::global())
        .unwrap()
        .iter()
        .map(|token| token.text.clone())
        .collect()
}

#[test]
fn identifiers_classify_against_the_registry() {
    assert_eq!(
        kinds("grab meta.x"),
        vec![TokenKind::Operator, TokenKind::Reference, TokenKind::Eof]
    );
    // The same byte sequence is a reference when it is not registered.
    assert_eq!(
        kinds("grabby meta.x"),
        vec![TokenKind::Reference, TokenKind::Reference, TokenKind::Eof]
    );
}

#[test]
fn modifiers_and_target_stay_in_one_token() {
    let words = texts("vault:nocache@prod \"secret/x\"");
    assert_eq!(words[0], "vault:nocache@prod");
    assert_eq!(
        kinds("vault:nocache@prod \"secret/x\"")[0],
        TokenKind::Operator
    );
}

#[test]
fn colon_after_a_non_operator_is_its_own_token() {
    assert_eq!(
        kinds("a ? b : c"),
        vec![
            TokenKind::Reference,
            TokenKind::Question,
            TokenKind::Reference,
            TokenKind::Colon,
            TokenKind::Reference,
            TokenKind::Eof
        ]
    );
}

#[test]
fn hyphen_mid_identifier_is_not_a_minus() {
    assert_eq!(
        kinds("some-key"),
        vec![TokenKind::Reference, TokenKind::Eof]
    );
    assert_eq!(texts("some-key")[0], "some-key");

    assert_eq!(
        kinds("a - b"),
        vec![
            TokenKind::Reference,
            TokenKind::Minus,
            TokenKind::Reference,
            TokenKind::Eof
        ]
    );
}

#[test]
fn dollar_forms() {
    assert_eq!(kinds("$HOME"), vec![TokenKind::EnvVar, TokenKind::Eof]);
    assert_eq!(kinds("$.a.b"), vec![TokenKind::Reference, TokenKind::Eof]);
    assert_eq!(kinds("$"), vec![TokenKind::Reference, TokenKind::Eof]);
    assert_eq!(texts("$.a.b")[0], "$.a.b");
}

#[test]
fn bang_equals_is_never_split() {
    assert_eq!(
        kinds("a != b"),
        vec![
            TokenKind::Reference,
            TokenKind::Ne,
            TokenKind::Reference,
            TokenKind::Eof
        ]
    );
    assert_eq!(kinds("! a")[0], TokenKind::Bang);
}

#[test]
fn logical_and_pipe_tokens() {
    assert_eq!(kinds("a || b")[1], TokenKind::Or);
    assert_eq!(kinds("a && b")[1], TokenKind::And);
    assert_eq!(kinds("a | b")[1], TokenKind::Pipe);
}

#[test]
fn string_escapes() {
    let tokens = tokenize(&Source::new(r#""a\nb\t\"c\\""#), Registry::global()).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::StringLit);
    assert_eq!(tokens[0].text, "a\nb\t\"c\\");
}

#[test]
fn unterminated_string_is_an_error() {
    let err = tokenize(&Source::new("\"oops"), Registry::global()).unwrap_err();
    assert!(err.message.contains("unterminated"), "{}", err.message);
}

#[test]
fn numbers() {
    assert_eq!(kinds("42")[0], TokenKind::IntLit);
    assert_eq!(kinds("3.14")[0], TokenKind::FloatLit);
    assert_eq!(kinds("1e3")[0], TokenKind::FloatLit);

    // A minus after an operand is a subtraction, before a digit it is a sign.
    assert_eq!(
        kinds("1 - 2"),
        vec![
            TokenKind::IntLit,
            TokenKind::Minus,
            TokenKind::IntLit,
            TokenKind::Eof
        ]
    );
    assert_eq!(
        kinds("( -5 )"),
        vec![
            TokenKind::OpenParen,
            TokenKind::IntLit,
            TokenKind::CloseParen,
            TokenKind::Eof
        ]
    );
    assert_eq!(texts("( -5 )")[1], "-5");
}

#[test]
fn offsets_cover_the_input() {
    let source = Source::new("grab meta.x || \"d\"");
    let tokens = tokenize(&source, Registry::global()).unwrap();
    for token in tokens.iter().filter(|token| !token.is_eof()) {
        assert!(token.start < token.end, "{:?}", token);
        assert!(token.end <= source.value.len());
    }
}

#[test]
fn positions_from_offsets() {
    let source = Source::new("a\nbb\nccc");
    let position = source.obtain_position(5);
    assert_eq!((position.line, position.column), (3, 1));
}
