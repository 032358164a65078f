use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( inject templates.base ))` splices the keys of the referenced mapping into
/// the enclosing parent mapping during the merge; keys written out explicitly next
/// to the call win over injected ones.
pub struct InjectOperator;

impl Operator for InjectOperator {
    fn phase(&self) -> Phase {
        Phase::Merge
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        match args.first() {
            Some(value @ Value::Map(_)) => Ok(Response::Inject(value.clone())),
            Some(other) => Err(Error::new(
                ErrorKind::Operator,
                format!("can only inject a mapping, got a {}", other.type_name()),
            )),
            None => Err(Error::new(
                ErrorKind::Operator,
                "missing argument #1".to_string(),
            )),
        }
    }
}
