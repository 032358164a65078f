//! The expression tokenizer.
//!
//! Identifiers are classified at the time of token emission by consulting the
//! operator registry: the same byte sequence is a reference or an operator depending
//! on registration. This lets the parser decide in O(1) whether an identifier starts
//! an operator call.

use crate::registry::{split_name, Registry};
use crate::{Error, Source, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?").unwrap());

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Whether the token may appear between two operands.
    pub fn is_binary(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Or
                | TokenKind::And
                | TokenKind::Eq
                | TokenKind::Ne
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Le
                | TokenKind::Ge
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
        )
    }
}

/// Tokenize the text between `((` and `))` into a flat token stream, ending with an
/// EOF token.
pub fn tokenize(source: &Source, registry: &Registry) -> Result<Vec<Token>, Error> {
    let text = source.value;
    let bytes = text.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut pointer = 0;

    while pointer < bytes.len() {
        let rest = &text[pointer..];
        let c = rest.chars().next().expect("pointer is on a char boundary");

        if c.is_whitespace() {
            pointer += c.len_utf8();
            continue;
        }

        match c {
            '"' => {
                let (value, end) = consume_string(source, pointer)?;
                tokens.push(Token::new(TokenKind::StringLit, value, pointer, end));
                pointer = end;
            }
            '|' => {
                if rest.starts_with("||") {
                    tokens.push(Token::new(TokenKind::Or, "||", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Pipe, "|", pointer, pointer + 1));
                    pointer += 1;
                }
            }
            '&' => {
                if rest.starts_with("&&") {
                    tokens.push(Token::new(TokenKind::And, "&&", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    return Err(unexpected(source, pointer, "`&`"));
                }
            }
            '=' => {
                if rest.starts_with("==") {
                    tokens.push(Token::new(TokenKind::Eq, "==", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    return Err(unexpected(source, pointer, "`=`"));
                }
            }
            '!' => {
                // `!=` is never split into `!` `=`.
                if rest.starts_with("!=") {
                    tokens.push(Token::new(TokenKind::Ne, "!=", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Bang, "!", pointer, pointer + 1));
                    pointer += 1;
                }
            }
            '<' => {
                if rest.starts_with("<=") {
                    tokens.push(Token::new(TokenKind::Le, "<=", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Lt, "<", pointer, pointer + 1));
                    pointer += 1;
                }
            }
            '>' => {
                if rest.starts_with(">=") {
                    tokens.push(Token::new(TokenKind::Ge, ">=", pointer, pointer + 2));
                    pointer += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Gt, ">", pointer, pointer + 1));
                    pointer += 1;
                }
            }
            '(' => {
                tokens.push(Token::new(TokenKind::OpenParen, "(", pointer, pointer + 1));
                pointer += 1;
            }
            ')' => {
                tokens.push(Token::new(TokenKind::CloseParen, ")", pointer, pointer + 1));
                pointer += 1;
            }
            ',' => {
                tokens.push(Token::new(TokenKind::Comma, ",", pointer, pointer + 1));
                pointer += 1;
            }
            '?' => {
                tokens.push(Token::new(TokenKind::Question, "?", pointer, pointer + 1));
                pointer += 1;
            }
            ':' => {
                tokens.push(Token::new(TokenKind::Colon, ":", pointer, pointer + 1));
                pointer += 1;
            }
            '+' => {
                tokens.push(Token::new(TokenKind::Plus, "+", pointer, pointer + 1));
                pointer += 1;
            }
            '*' => {
                tokens.push(Token::new(TokenKind::Star, "*", pointer, pointer + 1));
                pointer += 1;
            }
            '/' => {
                tokens.push(Token::new(TokenKind::Slash, "/", pointer, pointer + 1));
                pointer += 1;
            }
            '%' => {
                tokens.push(Token::new(TokenKind::Percent, "%", pointer, pointer + 1));
                pointer += 1;
            }
            '-' => {
                if follows_operand(&tokens) || !starts_number(rest) {
                    tokens.push(Token::new(TokenKind::Minus, "-", pointer, pointer + 1));
                    pointer += 1;
                } else {
                    let m = NUMBER
                        .find(&rest[1..])
                        .expect("starts_number checked the digit");
                    let end = pointer + 1 + m.end();
                    tokens.push(number_token(&text[pointer..end], pointer, end));
                    pointer = end;
                }
            }
            '$' => {
                let (token, end) = consume_dollar(text, pointer);
                tokens.push(token);
                pointer = end;
            }
            _ if c.is_ascii_digit() => {
                let m = NUMBER.find(rest).expect("digit starts a number");
                let end = pointer + m.end();
                tokens.push(number_token(&text[pointer..end], pointer, end));
                pointer = end;
            }
            _ if is_identifier_start(c) => {
                let (token, end) = consume_identifier(source, pointer, registry)?;
                tokens.push(token);
                pointer = end;
            }
            _ => return Err(unexpected(source, pointer, &format!("`{}`", c))),
        }
    }

    tokens.push(Token::new(TokenKind::Eof, "", bytes.len(), bytes.len()));
    Ok(tokens)
}

fn unexpected(source: &Source, pointer: usize, what: &str) -> Error {
    Error::syntax(
        format!("unexpected {}", what),
        source.obtain_position(pointer),
    )
    .with_snippet(source.value.to_string())
}

/// Whether the previous token completes an operand, making a following `-` a
/// subtraction rather than a numeric sign.
fn follows_operand(tokens: &[Token]) -> bool {
    matches!(
        tokens.last().map(|t| t.kind),
        Some(
            TokenKind::Reference
                | TokenKind::IntLit
                | TokenKind::FloatLit
                | TokenKind::StringLit
                | TokenKind::BoolLit
                | TokenKind::NullLit
                | TokenKind::EnvVar
                | TokenKind::CloseParen
        )
    )
}

fn starts_number(rest: &str) -> bool {
    rest.len() > 1 && rest.as_bytes()[1].is_ascii_digit()
}

fn number_token(text: &str, start: usize, end: usize) -> Token {
    let kind = if text.contains('.') || text.contains('e') || text.contains('E') {
        TokenKind::FloatLit
    } else {
        TokenKind::IntLit
    };
    Token::new(kind, text, start, end)
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Inside `".."` every character is literal until the closing quote; `\` escapes the
/// next character.
fn consume_string(source: &Source, start: usize) -> Result<(String, usize), Error> {
    let text = source.value;
    let mut value = String::new();
    let mut chars = text[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Ok((value, start + 1 + offset + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, 't')) => value.push('\t'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            _ => value.push(c),
        }
    }

    Err(Error::syntax(
        "unterminated string literal".to_string(),
        source.obtain_position(start),
    )
    .with_snippet(text.to_string()))
}

/// `$NAME` is an environment variable; `$.` (and a bare `$`) starts a reference to
/// the document root.
fn consume_dollar(text: &str, start: usize) -> (Token, usize) {
    let rest = &text[start + 1..];
    if rest.starts_with('.') {
        let mut end = start + 1;
        for c in rest.chars() {
            if is_identifier_continue(c) || c == '-' || c == '[' || c == ']' {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        return (
            Token::new(TokenKind::Reference, &text[start..end], start, end),
            end,
        );
    }

    let mut end = start + 1;
    for c in rest.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            end += 1;
        } else {
            break;
        }
    }
    if end == start + 1 {
        // A lone `$` is the document root.
        return (Token::new(TokenKind::Reference, "$", start, end), end);
    }
    (
        Token::new(TokenKind::EnvVar, &text[start..end], start, end),
        end,
    )
}

/// Scan an identifier, honoring the hyphen, colon, target and bracket rules, and
/// classify it against the registry.
fn consume_identifier(
    source: &Source,
    start: usize,
    registry: &Registry,
) -> Result<(Token, usize), Error> {
    let text = source.value;
    let mut end = start;
    let mut chars = text[start..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let at = start + offset;
        if is_identifier_continue(c) {
            end = at + c.len_utf8();
            continue;
        }
        match c {
            // A hyphen stays part of the identifier when an identifier character
            // follows, otherwise it is the subtraction token.
            '-' => match chars.peek() {
                Some((_, next)) if is_identifier_continue(*next) => {
                    end = at + 1;
                }
                _ => break,
            },
            // A colon or target suffix is kept only while the base identifier names
            // a registered operator.
            ':' | '@' => {
                let (base, _, _) = split_name(&text[start..at]);
                let continues = chars
                    .peek()
                    .map_or(false, |(_, next)| is_identifier_continue(*next));
                if registry.is_operator(base) && continues {
                    end = at + 1;
                } else {
                    break;
                }
            }
            // `[k]` segments pass through verbatim for the cursor parser.
            '[' => {
                let close = match text[at..].find(']') {
                    Some(found) => at + found,
                    None => {
                        return Err(Error::syntax(
                            "unterminated `[` in reference".to_string(),
                            source.obtain_position(at),
                        )
                        .with_snippet(text.to_string()))
                    }
                };
                while let Some((offset, _)) = chars.peek() {
                    if start + *offset > close {
                        break;
                    }
                    chars.next();
                }
                end = close + 1;
            }
            _ => break,
        }
    }

    let word = &text[start..end];
    let (base, _, _) = split_name(word);
    let kind = if registry.is_operator(base) {
        TokenKind::Operator
    } else {
        match word {
            "true" | "false" => TokenKind::BoolLit,
            "null" | "nil" => TokenKind::NullLit,
            _ => TokenKind::Reference,
        }
    };
    Ok((Token::new(kind, word, start, end), end))
}
