use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( negate some.flag ))` is the boolean inverse of its argument.
pub struct NegateOperator;

impl Operator for NegateOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        match args.first() {
            Some(value) => Ok(Response::Replace(Value::Bool(!value.is_truthy()))),
            None => Err(Error::new(
                ErrorKind::Operator,
                "missing argument #1".to_string(),
            )),
        }
    }
}
