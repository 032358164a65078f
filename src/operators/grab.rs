use crate::{Error, OpContext, Operator, Phase, Response, Value};

/// `(( grab a.b.c ))` copies the value at another cursor; with several arguments
/// the copies are collected into a sequence, sequences flattened.
pub struct GrabOperator;

impl Operator for GrabOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        if args.len() == 1 {
            return Ok(Response::Replace(args[0].clone()));
        }
        let mut collected = Vec::new();
        for arg in args {
            match arg {
                Value::Seq(items) => collected.extend(items.iter().cloned()),
                other => collected.push(other.clone()),
            }
        }
        Ok(Response::Replace(Value::Seq(collected)))
    }
}
