use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( keys some.mapping ))` lists the keys of the referenced mappings in their
/// document order.
pub struct KeysOperator;

impl Operator for KeysOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let mut keys = Vec::new();
        for arg in args {
            match arg {
                Value::Map(map) => {
                    keys.extend(map.keys().cloned().map(Value::String));
                }
                other => {
                    return Err(Error::new(
                        ErrorKind::Operator,
                        format!("expected a mapping, got a {}", other.type_name()),
                    ))
                }
            }
        }
        Ok(Response::Replace(Value::Seq(keys)))
    }
}
