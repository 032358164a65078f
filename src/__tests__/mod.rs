mod cursor_test;
mod eval_test;
mod merge_test;
mod parser_test;
mod pool_test;
mod post_test;
mod tokenizer_test;
mod tree_test;

use crate::Value;

pub fn doc(json: &str) -> Value {
    match Value::from_json(json) {
        Ok(value) => value,
        Err(err) => panic!("test document is invalid: {}", err),
    }
}
