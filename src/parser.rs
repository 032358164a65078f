//! The precedence climbing expression parser.
//!
//! Precedence, low to high: `||` (with `?:` at the same level, right associative),
//! `&&`, equality, comparison, additive, multiplicative, unary, postfix. An operator
//! identifier with no argument-like follow-on is a reference, which is what lets
//! `grab` appear alone as a key name while `grab foo.bar` is a call.

use crate::registry::{split_name, Registry};
use crate::tokenizer::tokenize;
use crate::{
    BinaryOp, Cursor, Error, Expression, OperatorCall, Report, Source, Token, TokenKind, Value,
};

/// A recoverable parse failure; the error itself is on the run's collector.
type Attempt<T> = Result<T, ()>;

/// A configurable expression parser.
///
/// By default the first error surfaces immediately; [collecting](Self::collecting)
/// raises the limit, letting the parser synchronize at the next `)`, `,` or `||`
/// and report several errors in one pass.
pub struct ExpressionParser<'r> {
    registry: &'r Registry,
    max_errors: usize,
}

impl<'r> ExpressionParser<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            max_errors: 1,
        }
    }

    pub fn collecting(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    /// Parse one expression source; `Ok(None)` when the source is empty.
    pub fn parse(&self, source: &Source) -> Result<Option<Expression>, Report> {
        let tokens = tokenize(source, self.registry).map_err(Report::from)?;
        self.parse_tokens(source, &tokens)
    }

    /// Parse an already tokenized source, as the memoization cache does.
    pub fn parse_tokens(
        &self,
        source: &Source<'_>,
        tokens: &[Token],
    ) -> Result<Option<Expression>, Report> {
        let mut run = Run {
            tokens,
            source,
            registry: self.registry,
            pos: 0,
            errors: Vec::new(),
        };

        if run.peek().is_eof() {
            return Ok(None);
        }

        let mut parsed = None;
        loop {
            match run.parse_expression() {
                Ok(expr) => {
                    if run.peek().is_eof() {
                        parsed = Some(expr);
                        break;
                    }
                    let at = run.peek().start;
                    let what = run.peek().text.clone();
                    run.note(at, format!("unexpected `{}`", what));
                }
                Err(()) => {}
            }
            if run.errors.len() >= self.max_errors {
                break;
            }
            run.synchronize();
            if run.peek().is_eof() {
                break;
            }
            run.advance();
        }

        if run.errors.is_empty() {
            Ok(parsed)
        } else {
            let mut report = Report::new();
            report.extend(run.errors);
            Err(report)
        }
    }
}

struct Run<'p> {
    tokens: &'p [Token],
    source: &'p Source<'p>,
    registry: &'p Registry,
    pos: usize,
    errors: Vec<Error>,
}

impl<'p> Run<'p> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn note(&mut self, at: usize, message: String) {
        self.errors.push(
            Error::syntax(message, self.source.obtain_position(at))
                .with_snippet(self.source.value.to_string()),
        );
    }

    fn fail<T>(&mut self, at: usize, message: String) -> Attempt<T> {
        self.note(at, message);
        Err(())
    }

    /// Skip to the next `)`, `,` or `||`.
    fn synchronize(&mut self) {
        while !matches!(
            self.peek().kind,
            TokenKind::CloseParen | TokenKind::Comma | TokenKind::Or | TokenKind::Eof
        ) {
            self.advance();
        }
    }

    fn parse_expression(&mut self) -> Attempt<Expression> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Attempt<Expression> {
        let condition = self.parse_or()?;
        if !self.eat(TokenKind::Question) {
            return Ok(condition);
        }
        let then = self.parse_ternary()?;
        if !self.eat(TokenKind::Colon) {
            let at = self.peek().start;
            return self.fail(at, "expected `:` of the ternary".to_string());
        }
        let otherwise = self.parse_ternary()?;
        Ok(Expression::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Attempt<Expression> {
        let left = self.parse_and()?;
        if self.eat(TokenKind::Or) {
            let right = self.parse_or()?;
            return Ok(Expression::Or(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Attempt<Expression> {
        let mut left = self.parse_equality()?;
        while self.eat(TokenKind::And) {
            let right = self.parse_equality()?;
            left = operation(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Attempt<Expression> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = operation(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Attempt<Expression> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = operation(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Attempt<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = operation(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Attempt<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = operation(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Attempt<Expression> {
        if self.eat(TokenKind::Bang) {
            let inner = self.parse_unary()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.parse_operand()
    }

    /// An operand in expression position: literals, references, environment
    /// variables, parenthesized sub-expressions and operator calls.
    fn parse_operand(&mut self) -> Attempt<Expression> {
        match self.peek().kind {
            TokenKind::Operator => self.parse_call_or_reference(),
            _ => self.parse_simple(),
        }
    }

    /// An operand in argument position. An operator identifier here is subject
    /// to the same no-follow-on rule as anywhere else, so it may start a nested
    /// call.
    fn parse_argument(&mut self) -> Attempt<Expression> {
        match self.peek().kind {
            TokenKind::Operator => self.parse_call_or_reference(),
            _ => self.parse_simple(),
        }
    }

    /// The first argument of a reference-expecting operator: an identifier is a
    /// cursor even when it coincides with a registered operator name.
    fn parse_reference_argument(&mut self) -> Attempt<Expression> {
        match self.peek().kind {
            TokenKind::Operator | TokenKind::Reference => {
                let token = self.advance();
                let text = token.text.clone();
                let start = token.start;
                self.cursor_of(&text, start).map(Expression::Reference)
            }
            _ => self.parse_simple(),
        }
    }

    fn parse_simple(&mut self) -> Attempt<Expression> {
        let token = self.advance().clone();
        match token.kind {
            TokenKind::StringLit => Ok(Expression::Literal(Value::String(token.text))),
            TokenKind::IntLit => match token.text.parse::<i64>() {
                Ok(n) => Ok(Expression::Literal(Value::Int(n))),
                Err(_) => self.fail(token.start, format!("invalid integer `{}`", token.text)),
            },
            TokenKind::FloatLit => match token.text.parse::<f64>() {
                Ok(x) => Ok(Expression::Literal(Value::Float(x))),
                Err(_) => self.fail(token.start, format!("invalid number `{}`", token.text)),
            },
            TokenKind::BoolLit => Ok(Expression::Literal(Value::Bool(token.text == "true"))),
            TokenKind::NullLit => Ok(Expression::Literal(Value::Null)),
            TokenKind::EnvVar => Ok(Expression::EnvVar(token.text[1..].to_string())),
            TokenKind::Reference => self
                .cursor_of(&token.text, token.start)
                .map(Expression::Reference),
            TokenKind::OpenParen => {
                // Parentheses re-enter the full grammar even inside arguments.
                let inner = self.parse_expression()?;
                if !self.eat(TokenKind::CloseParen) {
                    let at = self.peek().start;
                    return self.fail(at, "expected `)`".to_string());
                }
                Ok(inner)
            }
            TokenKind::Eof => self.fail(token.start, "unexpected end of expression".to_string()),
            _ => self.fail(token.start, format!("unexpected `{}`", token.text)),
        }
    }

    fn cursor_of(&mut self, text: &str, at: usize) -> Attempt<Cursor> {
        match Cursor::parse(text) {
            Ok(cursor) => Ok(cursor),
            Err(err) => self.fail(at, err.message),
        }
    }

    fn parse_call_or_reference(&mut self) -> Attempt<Expression> {
        let token = self.advance().clone();

        // No argument-like follow-on: the identifier is a plain reference.
        if matches!(
            self.peek().kind,
            TokenKind::Eof
                | TokenKind::CloseParen
                | TokenKind::Comma
                | TokenKind::Question
                | TokenKind::Colon
        ) || self.peek().is_binary()
        {
            return self
                .cursor_of(&token.text, token.start)
                .map(Expression::Reference);
        }

        let (base, modifiers, target) = split_name(&token.text);
        let base = base.to_string();
        let modifiers: Vec<String> = modifiers.into_iter().map(str::to_string).collect();
        let target = target.map(str::to_string);

        let info = match self.registry.lookup(&base) {
            Some((_, info)) => info,
            None => return self.fail(token.start, format!("unknown operator `{}`", base)),
        };

        let mut groups: Vec<OperatorCall> = Vec::new();
        loop {
            let args = if base == "defer" {
                self.collect_raw_args()
            } else {
                self.collect_args(&info)?
            };
            let end = self.previous_end(token.end);
            let call = OperatorCall {
                name: base.clone(),
                target: target.clone(),
                modifiers: modifiers.clone(),
                args,
                span: (token.start, end),
            };
            if call.args.len() < info.min_args {
                // Recorded without aborting so that sibling errors still surface.
                self.note(
                    token.start,
                    format!(
                        "operator `{}` expects at least {} argument(s)",
                        base, info.min_args
                    ),
                );
            }
            groups.push(call);
            // The vault choice `|` separates alternative argument groups.
            if !self.eat(TokenKind::Pipe) {
                break;
            }
        }

        let mut expr = Expression::Call(groups.pop().expect("at least one group"));
        while let Some(call) = groups.pop() {
            expr = Expression::Or(Box::new(Expression::Call(call)), Box::new(expr));
        }
        Ok(expr)
    }

    /// Space separated arguments until `||`, `)`, `,`, a binary operator, or the
    /// operator's argument limit.
    fn collect_args(&mut self, info: &crate::registry::OperatorInfo) -> Attempt<Vec<Expression>> {
        let mut args = Vec::new();
        loop {
            if matches!(
                self.peek().kind,
                TokenKind::Eof
                    | TokenKind::CloseParen
                    | TokenKind::Comma
                    | TokenKind::Question
                    | TokenKind::Colon
                    | TokenKind::Pipe
            ) || self.peek().is_binary()
            {
                return Ok(args);
            }
            if info.max_args >= 0 && args.len() == info.max_args as usize {
                return Ok(args);
            }
            let arg = if args.is_empty() && info.reference_args {
                self.parse_reference_argument()?
            } else {
                self.parse_argument()?
            };
            args.push(arg);
        }
    }

    /// The legacy whitespace tokenized pass of `defer`: every token is kept
    /// verbatim, `||` included, so the deferred expression re-renders unreduced.
    fn collect_raw_args(&mut self) -> Vec<Expression> {
        let mut args = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::Eof => return args,
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => {
                    if depth == 0 {
                        return args;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            let (start, end) = {
                let token = self.advance();
                (token.start, token.end)
            };
            args.push(Expression::Literal(Value::String(
                self.source.value[start..end].to_string(),
            )));
        }
    }

    fn previous_end(&self, fallback: usize) -> usize {
        if self.pos == 0 {
            fallback
        } else {
            self.tokens[self.pos - 1].end
        }
    }
}

fn operation(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Operation {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
