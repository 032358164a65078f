use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( stringify some.subtree ))` renders the referenced value as an indented
/// document string, useful for embedding one document inside another.
pub struct StringifyOperator;

impl Operator for StringifyOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let value = args.first().ok_or_else(|| {
            Error::new(ErrorKind::Operator, "missing argument #1".to_string())
        })?;
        Ok(Response::Replace(Value::String(value.to_json())))
    }
}
