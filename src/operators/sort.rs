use super::scalar_string;
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};
use std::cmp::Ordering;

/// `(( sort some.list ))` orders a sequence of scalars; `(( sort jobs "name" ))`
/// orders a sequence of mappings by the named field.
pub struct SortOperator;

impl Operator for SortOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let items = match args.first() {
            Some(Value::Seq(items)) => items.clone(),
            Some(other) => {
                return Err(Error::new(
                    ErrorKind::Operator,
                    format!("expected a sequence, got a {}", other.type_name()),
                ))
            }
            None => {
                return Err(Error::new(
                    ErrorKind::Operator,
                    "missing argument #1".to_string(),
                ))
            }
        };

        let mut sorted = items;
        match args.get(1) {
            None => sorted.sort_by(compare_scalars),
            Some(_) => {
                let field = scalar_string(args, 1)?;
                for item in &sorted {
                    if !matches!(item, Value::Map(map) if map.contains_key(&field)) {
                        return Err(Error::new(
                            ErrorKind::Operator,
                            format!("every element must be a mapping with a `{}` field", field),
                        ));
                    }
                }
                sorted.sort_by(|a, b| {
                    let left = a.as_map().and_then(|m| m.get(&field));
                    let right = b.as_map().and_then(|m| m.get(&field));
                    match (left, right) {
                        (Some(left), Some(right)) => compare_scalars(left, right),
                        _ => Ordering::Equal,
                    }
                });
            }
        }
        Ok(Response::Replace(Value::Seq(sorted)))
    }
}

fn compare_scalars(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
