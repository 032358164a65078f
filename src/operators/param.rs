use super::scalar_string;
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( param "please set x" ))` asserts that a later document overrides this
/// value; one that survives the merge is an error carrying the message.
pub struct ParamOperator;

impl Operator for ParamOperator {
    fn phase(&self) -> Phase {
        Phase::Param
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let message = scalar_string(args, 0).unwrap_or_else(|_| "this value".to_string());
        Err(Error::new(
            ErrorKind::Operator,
            format!("{} is a required parameter", message),
        ))
    }
}
