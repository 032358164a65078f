use crate::{Error, ErrorKind, Expression, Map, OpContext, Operator, Phase, Response, Value};

/// `(( empty hash ))`, `(( empty list ))` and `(( empty string ))` produce the
/// corresponding empty value. The argument is a bare word inspected as written, so
/// this operator opts out of argument reduction.
pub struct EmptyOperator;

impl Operator for EmptyOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn reduces_arguments(&self) -> bool {
        false
    }

    fn run(&self, ctx: &OpContext, _args: &[Value]) -> Result<Response, Error> {
        let word = match ctx.raw_args.first() {
            Some(Expression::Reference(cursor)) => cursor.to_string(),
            Some(Expression::Literal(Value::String(word))) => word.clone(),
            _ => {
                return Err(Error::new(
                    ErrorKind::Operator,
                    "expected one of `hash`, `map`, `array`, `list` or `string`".to_string(),
                ))
            }
        };
        let value = match word.as_str() {
            "hash" | "map" => Value::Map(Map::new()),
            "array" | "list" => Value::Seq(Vec::new()),
            "string" => Value::String(String::new()),
            other => {
                return Err(Error::new(
                    ErrorKind::Operator,
                    format!(
                        "`{}` is not an empty value; expected one of `hash`, `map`, `array`, `list` or `string`",
                        other
                    ),
                ))
            }
        };
        Ok(Response::Replace(value))
    }
}
