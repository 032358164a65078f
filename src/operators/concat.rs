use super::join_scalars;
use crate::{Error, OpContext, Operator, Phase, Response, Value};

/// `(( concat "https://" meta.host ))` renders every argument as a string and
/// concatenates them.
pub struct ConcatOperator;

impl Operator for ConcatOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        Ok(Response::Replace(Value::String(join_scalars(args)?)))
    }
}
