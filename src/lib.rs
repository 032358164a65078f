//! Graft is a document composition engine. It consumes one or more structured
//! documents (trees of maps, sequences and scalars keyed by strings) and produces a
//! single composed document by deep merging the inputs and then evaluating the
//! `(( .. ))` expressions embedded in them.
//!
//! # Overview
//! Configuration for a large deployment is rarely written as one file. Instead a base
//! document is layered with environment specific overrides, and the layered result
//! refers back to itself: a job grabs an address from a `meta` block, a URL is
//! concatenated from pieces, a credential is fetched from a secret store. Graft folds
//! the layers together under documented merge rules and then resolves every embedded
//! expression exactly once, in dependency order.
//!
//! The engine is organised in three tightly coupled subsystems:
//!
//! 1. The expression language: a registry aware [tokenizer](tokenize) and a
//!    precedence climbing [parser](ExpressionParser) which turn the text between
//!    `((` and `))` into an [Expression] tree, with memoization and error recovery.
//! 2. The merge and evaluate pipeline: [Engine] folds parsed documents together,
//!    discovers the [Opcall]s of the merged tree, orders them by their read sets and
//!    executes each one exactly once.
//! 3. The runtime substrate: a sharded concurrent [cache](cache::ShardedCache) and a
//!    bounded [worker pool](pool::WorkerPool) with token bucket rate limiting which
//!    back the I/O bound operators.
//!
//! # Example
//!
//! ```
//! use graft::{Cursor, Engine, EngineOptions, Value};
//!
//! let base = Value::from_json(
//!     r#"{
//!         "meta": { "host": "example.com" },
//!         "url": "(( concat \"https://\" meta.host ))",
//!         "jobs": [ { "name": "web", "instances": 1 } ]
//!     }"#,
//! )
//! .unwrap();
//!
//! let patch = Value::from_json(
//!     r#"{
//!         "jobs": [ { "name": "web", "instances": 3 } ]
//!     }"#,
//! )
//! .unwrap();
//!
//! let engine = Engine::new(EngineOptions::default());
//! let composed = engine.run(vec![base, patch]).unwrap();
//!
//! let url = Cursor::parse("url").unwrap();
//! assert_eq!(
//!     url.resolve(&composed).unwrap(),
//!     &Value::String("https://example.com".into())
//! );
//! let instances = Cursor::parse("jobs.web.instances").unwrap();
//! assert_eq!(instances.resolve(&composed).unwrap(), &Value::Int(3));
//! ```
//!
//! # License
//! [graft](crate) is provided under the MIT license.

mod analysis;
pub mod cache;
pub mod config;
mod cursor;
pub mod diff;
mod engine;
mod errors;
mod eval;
mod expression;
mod memo;
mod merge;
pub mod operators;
mod parser;
pub mod pool;
mod post;
pub mod registry;
mod runtime;
mod source;
mod tokenizer;
mod tree;

#[cfg(test)]
mod __tests__;

pub use engine::fan;
pub use memo::{parse_cached, parse_metrics, pattern_report, ParsedExpression};
pub use parser::ExpressionParser;
pub use post::{cherry_pick, cycle_check, prune};
pub use runtime::Runtime;
pub use tokenizer::tokenize;

use once_cell::unsync::OnceCell;
use std::sync::Arc;

/// A primitive document value.
///
/// The document tree is heterogeneous and dispatches on this tag everywhere:
/// resolution, merging and evaluation are closed form pattern matches. A well formed
/// input contains no reference cycles; the tree is self referential only through
/// structural containment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(Map),
}

/// An ordered string keyed mapping.
///
/// Key order is the original document order, which the merger and the `insertion`
/// dataflow order both rely on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

/// The line and column information at a point of an expression source.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A wrapper for one expression source with lazily indexed line breaks.
pub struct Source<'s> {
    pub value: &'s str,
    line_breaks: OnceCell<Vec<usize>>,
}

/// A parsed reference path through the document tree.
///
/// Cursors are immutable after parse. A dot separates segments outside brackets,
/// `[k]` forces `k` to be a single segment even if it contains dots, and a leading
/// `$` root marker is stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor {
    segments: Vec<String>,
}

/// The type of a [Token].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// An identifier which is a registered operator, possibly carrying `:modifier`
    /// and `@target` suffixes.
    Operator,
    /// An identifier which is not a registered operator.
    Reference,
    /// `$NAME`; note that `$.` starts a reference to the document root instead.
    EnvVar,
    StringLit,
    IntLit,
    FloatLit,
    BoolLit,
    NullLit,
    Comma,
    OpenParen,
    CloseParen,
    Question,
    Colon,
    /// The logical `||`.
    Or,
    /// The logical `&&`.
    And,
    /// The vault choice `|`.
    Pipe,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eof,
}

/// Element of the tokenized expression source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A binary operation of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
}

/// A parsed expression tree.
///
/// `Or` is its own tag rather than an operator because it short circuits and must
/// tolerate a left side which fails to resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Reference(Cursor),
    EnvVar(String),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Operation {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    Call(OperatorCall),
}

/// An operator call of the expression language.
///
/// Equality ignores the source span, which is diagnostic metadata: the same call
/// written at two offsets is the same call.
#[derive(Debug, Clone)]
pub struct OperatorCall {
    pub name: String,
    pub target: Option<String>,
    pub modifiers: Vec<String>,
    pub args: Vec<Expression>,
    /// Byte range of the call in the expression source.
    pub span: (usize, usize),
}

/// When an operator is invoked during the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Asserts a required input; surfaced as an error when it survives the merge.
    Param,
    /// Executed during structural combination with the partially merged tree.
    Merge,
    /// Executed after the merge against the merged tree.
    Eval,
}

/// The result of running one opcall.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Substitute the value at the opcall position.
    Replace(Value),
    /// Splice a mapping into the enclosing parent mapping.
    Inject(Value),
}

/// A bound invocation discovered by analysis and consumed by evaluation.
///
/// Opcalls live only within one run of the engine. During evaluation each opcall
/// transitions through pending, ready, running and done exactly once.
pub struct Opcall {
    /// The canonical cursor of the position where the result is placed.
    pub canonical: Cursor,
    /// The parsed expression; an [Expression::Call] for operator calls, otherwise a
    /// bare reference, logical or, or operation form.
    pub expr: Expression,
    /// The original `(( .. ))` source string.
    pub source: String,
    /// The bound operator implementation of a call form.
    pub op: Option<Arc<dyn Operator>>,
    pub phase: Phase,
    /// The set of cursors this opcall reads, transitively closed over nested calls.
    pub reads: Vec<Cursor>,
}

/// The kind of an engine [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tokenizer or parser rejection.
    Syntax,
    /// A cursor could not be resolved; the message names the narrowest failing
    /// prefix.
    NotFound,
    /// A cursor resolved to the wrong shape.
    TypeMismatch,
    /// A self referencing dataset, or an evaluation round which made no progress.
    Cycle,
    /// An operator run returned an error.
    Operator,
    /// Invalid configuration, flag combination or missing input.
    Configuration,
}

/// An engine error carrying its source position and context.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    /// Line and column within the expression source, when known.
    pub position: Option<Position>,
    /// Dotted document path, when known.
    pub path: Option<String>,
    /// The offending expression source, when known.
    pub snippet: Option<String>,
}

/// An aggregate of errors collected across a parse or an evaluation round.
#[derive(Debug, Clone, Default)]
pub struct Report {
    errors: Vec<Error>,
}

/// Context handed to an operator [run](Operator::run).
///
/// The tree is a read only snapshot of the document under evaluation; workers never
/// mutate shared tree state.
pub struct OpContext<'run> {
    pub tree: &'run Value,
    /// Canonical cursor of the opcall under evaluation.
    pub here: &'run Cursor,
    /// The original expression source text.
    pub source: &'run str,
    /// The unreduced argument expressions.
    pub raw_args: &'run [Expression],
    /// The `@target` suffix of the call, routing it to a named backend.
    pub target: Option<&'run str>,
    /// The `:modifier` suffixes of the call.
    pub modifiers: &'run [String],
    pub runtime: &'run Runtime,
}

/// The contract every operator implementation satisfies.
pub trait Operator: Send + Sync {
    /// One shot initialization, invoked when the operator is registered.
    fn setup(&self) -> Result<(), Error> {
        Ok(())
    }

    fn phase(&self) -> Phase;

    /// Operator specific implicit read set, appended to the reads the analyzer
    /// derives from the arguments.
    fn dependencies(&self, _tree: &Value, _args: &[Expression], _here: &Cursor) -> Vec<Cursor> {
        Vec::new()
    }

    /// Produce a [Response] from the reduced arguments.
    fn run(&self, ctx: &OpContext, args: &[Value]) -> Result<Response, Error>;

    /// Whether arguments are reduced before [run](Operator::run). Operators which
    /// inspect their arguments as written (`defer`, `empty`) opt out and read
    /// [raw_args](OpContext::raw_args) instead.
    fn reduces_arguments(&self) -> bool {
        true
    }

    /// Whether results may be stored in the operator result cache.
    fn cacheable(&self) -> bool {
        false
    }
}

/// The traversal policy used when scheduling and reporting opcalls in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataflowOrder {
    /// Alphabetical by canonical path.
    #[default]
    Alphabetical,
    /// A stable pre-order walk of the merged tree, mapping keys in document order.
    Insertion,
}

/// Options controlling one run of the [Engine].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Concatenate sequences whose elements cannot be paired by name instead of
    /// overwriting.
    pub fallback_append: bool,
    /// Stop after the merge, skipping analysis and evaluation.
    pub skip_eval: bool,
    /// Paths removed from the final tree.
    pub prune: Vec<String>,
    /// Paths the final tree is projected to, when non empty.
    pub cherry_pick: Vec<String>,
    pub dataflow_order: DataflowOrder,
    /// Resolve one opcall's transitive dependencies before starting another instead
    /// of evaluating round by round.
    pub depth_first: bool,
    /// Worker count of the I/O pool.
    pub workers: usize,
    /// Queue size of the I/O pool.
    pub queue_size: usize,
    /// Requests per second across the I/O pool, unlimited when `None`.
    pub rate_limit: Option<u32>,
    /// Collect secret references instead of contacting the secret store.
    pub redact: bool,
}

/// The merge and evaluate pipeline, front to back.
pub struct Engine {
    opts: EngineOptions,
    runtime: Arc<Runtime>,
}
