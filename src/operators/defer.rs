use crate::{Error, Expression, OpContext, Operator, Phase, Response, Value};

/// `(( defer grab a || "x" ))` re-emits its arguments as an unevaluated
/// expression, `||` preserved literally, for a later composition pass to resolve.
pub struct DeferOperator;

impl Operator for DeferOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn reduces_arguments(&self) -> bool {
        false
    }

    fn run(&self, ctx: &OpContext, _args: &[Value]) -> Result<Response, Error> {
        let words: Vec<&str> = ctx
            .raw_args
            .iter()
            .filter_map(|arg| match arg {
                Expression::Literal(Value::String(word)) => Some(word.as_str()),
                _ => None,
            })
            .collect();
        Ok(Response::Replace(Value::String(format!(
            "(( {} ))",
            words.join(" ")
        ))))
    }
}
