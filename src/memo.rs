//! Global parse memoization.
//!
//! The cache is keyed by the expression source together with the registry
//! fingerprint: a registry change in a long lived process must never serve a stale
//! parse. Alongside the cache, a pattern tracker normalizes literal constants and
//! records expression shape frequencies for offline analysis.

use crate::cache::{CacheMetrics, ShardedCache};
use crate::parser::ExpressionParser;
use crate::registry::Registry;
use crate::tokenizer::tokenize;
use crate::{Expression, Report, Source, Token, TokenKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A memoized tokenization and parse of one expression source.
pub struct ParsedExpression {
    pub tokens: Vec<Token>,
    /// `None` when the source was empty.
    pub expr: Option<Expression>,
}

static PARSE_CACHE: Lazy<ShardedCache<Arc<ParsedExpression>>> = Lazy::new(|| {
    ShardedCache::new(
        "parsed-expressions",
        16,
        2048,
        Some(Duration::from_secs(600)),
    )
});

static PATTERNS: Lazy<Mutex<HashMap<String, u64>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn collect_limit() -> usize {
    match std::env::var("GRAFT_COLLECT_ERRORS").as_deref() {
        Ok("1") => 16,
        _ => 1,
    }
}

/// Tokenize and parse through the global cache.
pub fn parse_cached(text: &str, registry: &Registry) -> Result<Arc<ParsedExpression>, Report> {
    let key = format!("{:016x}:{}", registry.fingerprint(), text);
    if let Some(hit) = PARSE_CACHE.get(&key) {
        return Ok(hit);
    }

    let source = Source::new(text);
    let tokens = tokenize(&source, registry).map_err(Report::from)?;
    track_pattern(&tokens);
    let expr = ExpressionParser::new(registry)
        .collecting(collect_limit())
        .parse_tokens(&source, &tokens)?;

    let parsed = Arc::new(ParsedExpression { tokens, expr });
    PARSE_CACHE.set(&key, parsed.clone());
    Ok(parsed)
}

/// Counters of the global parse cache.
pub fn parse_metrics() -> CacheMetrics {
    PARSE_CACHE.metrics()
}

fn track_pattern(tokens: &[Token]) {
    let mut shape = String::new();
    for token in tokens {
        if token.is_eof() {
            break;
        }
        if !shape.is_empty() {
            shape.push(' ');
        }
        match token.kind {
            TokenKind::IntLit | TokenKind::FloatLit => shape.push('N'),
            TokenKind::StringLit => shape.push('S'),
            _ => shape.push_str(&token.text),
        }
    }
    if shape.is_empty() {
        return;
    }
    let mut patterns = PATTERNS.lock().expect("pattern tracker lock");
    *patterns.entry(shape).or_insert(0) += 1;
}

/// The most frequent normalized expression shapes, most frequent first.
pub fn pattern_report(limit: usize) -> Vec<(String, u64)> {
    let patterns = PATTERNS.lock().expect("pattern tracker lock");
    let mut shapes: Vec<(String, u64)> = patterns
        .iter()
        .map(|(shape, count)| (shape.clone(), *count))
        .collect();
    shapes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    shapes.truncate(limit);
    shapes
}
