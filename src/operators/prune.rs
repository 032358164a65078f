use crate::{Error, Expression, OpContext, Operator, Phase, Response, Value};

/// `(( prune ))` marks its own position for removal by the post-processor; with a
/// reference argument it marks that path instead. The argument is a cursor, not a
/// value, so this operator opts out of argument reduction.
pub struct PruneOperator;

impl Operator for PruneOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn reduces_arguments(&self) -> bool {
        false
    }

    fn run(&self, ctx: &OpContext, _args: &[Value]) -> Result<Response, Error> {
        match ctx.raw_args.first() {
            Some(Expression::Reference(cursor)) => ctx.runtime.mark_prune(cursor.clone()),
            _ => ctx.runtime.mark_prune(ctx.here.clone()),
        }
        Ok(Response::Replace(Value::Null))
    }
}
