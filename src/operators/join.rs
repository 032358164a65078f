use super::scalar_string;
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};
use itertools::Itertools;

/// `(( join ", " list ))` renders the elements of its arguments and joins them
/// with the separator. Sequence arguments are flattened one level.
pub struct JoinOperator;

impl Operator for JoinOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let separator = scalar_string(args, 0)?;
        let mut pieces: Vec<String> = Vec::new();
        for arg in &args[1..] {
            match arg {
                Value::Seq(items) => {
                    for item in items {
                        pieces.push(item.render_scalar().ok_or_else(|| {
                            Error::new(
                                ErrorKind::Operator,
                                format!("cannot join a {}", item.type_name()),
                            )
                        })?);
                    }
                }
                other => pieces.push(other.render_scalar().ok_or_else(|| {
                    Error::new(
                        ErrorKind::Operator,
                        format!("cannot join a {}", other.type_name()),
                    )
                })?),
            }
        }
        Ok(Response::Replace(Value::String(
            pieces.iter().join(&separator),
        )))
    }
}
