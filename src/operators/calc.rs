use super::scalar_string;
use crate::eval::reduce;
use crate::memo::parse_cached;
use crate::registry::Registry;
use crate::{Cursor, Error, ErrorKind, Expression, OpContext, Operator, Phase, Response, Value};

/// `(( calc "2 * meta.instances + 1" ))` parses its string argument as an
/// expression and reduces it against the current tree.
///
/// The references embedded in the formula join the opcall's read set, so a
/// formula over another opcall's output waits for that opcall to finish.
pub struct CalcOperator;

impl Operator for CalcOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn dependencies(&self, _tree: &Value, args: &[Expression], _here: &Cursor) -> Vec<Cursor> {
        let formula = match args.first() {
            Some(Expression::Literal(Value::String(formula))) => formula,
            _ => return Vec::new(),
        };
        // A malformed formula surfaces from run(), with the opcall's position.
        let parsed = match parse_cached(formula, Registry::global()) {
            Ok(parsed) => parsed,
            Err(_) => return Vec::new(),
        };

        let mut reads = Vec::new();
        if let Some(expr) = &parsed.expr {
            expr.walk(&mut |node| {
                if let Expression::Reference(cursor) = node {
                    reads.push(cursor.clone());
                }
            });
        }
        reads
    }

    fn run(&self, ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        // An already numeric argument arrives from a nested call; pass it through.
        if let Some(value @ (Value::Int(_) | Value::Float(_))) = args.first() {
            return Ok(Response::Replace(value.clone()));
        }

        let formula = scalar_string(args, 0)?;
        let parsed = parse_cached(&formula, Registry::global()).map_err(|report| {
            Error::new(
                ErrorKind::Operator,
                format!("invalid formula `{}`: {}", formula, report),
            )
        })?;
        let expr = parsed.expr.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Operator, "empty formula".to_string())
        })?;
        Ok(Response::Replace(reduce(expr, ctx)?))
    }
}
