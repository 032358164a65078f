use super::scalar_string;
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( env "HOME" ))` reads an environment variable; an optional second argument
/// is the fallback when the variable is unset.
pub struct EnvOperator;

impl Operator for EnvOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let name = scalar_string(args, 0)?;
        match std::env::var(&name) {
            Ok(value) => Ok(Response::Replace(Value::String(value))),
            Err(_) => match args.get(1) {
                Some(fallback) => Ok(Response::Replace(fallback.clone())),
                None => Err(Error::new(
                    ErrorKind::Operator,
                    format!("environment variable ${} is not set", name),
                )),
            },
        }
    }
}
