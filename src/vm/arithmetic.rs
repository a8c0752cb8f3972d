//! Binary operator semantics shared by the VM's dispatch loop. Pulled out of
//! `mod.rs` because every one of these needs the same "both numbers, else
//! runtime error" shape except `add`, which also accepts two strings.

use crate::value::{Obj, Value};

pub type ArithResult = Result<Value, String>;

pub fn add(a: &Value, b: &Value) -> ArithResult {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
    (Value::Obj(Obj::Str(x)), Value::Obj(Obj::Str(y))) => {
      let mut s = String::with_capacity(x.len() + y.len());
      s.push_str(x);
      s.push_str(y);
      Ok(Value::from(s))
    }
    _ => Err("Operands must be two numbers or two strings.".to_string()),
  }
}

pub fn subtract(a: &Value, b: &Value) -> ArithResult {
  numeric(a, b, |x, y| x - y)
}

pub fn multiply(a: &Value, b: &Value) -> ArithResult {
  numeric(a, b, |x, y| x * y)
}

/// IEEE-754 division: `1 / 0` yields `inf`, `0 / 0` yields `NaN`, neither is
/// a runtime error. Only non-number operands are rejected.
pub fn divide(a: &Value, b: &Value) -> ArithResult {
  numeric(a, b, |x, y| x / y)
}

pub fn greater(a: &Value, b: &Value) -> ArithResult {
  compare(a, b, |x, y| x > y)
}

pub fn less(a: &Value, b: &Value) -> ArithResult {
  compare(a, b, |x, y| x < y)
}

fn numeric(a: &Value, b: &Value, op: impl Fn(f64, f64) -> f64) -> ArithResult {
  match (a.as_number(), b.as_number()) {
    (Some(x), Some(y)) => Ok(Value::Number(op(x, y))),
    _ => Err("Operands must be numbers.".to_string()),
  }
}

fn compare(a: &Value, b: &Value, op: impl Fn(f64, f64) -> bool) -> ArithResult {
  match (a.as_number(), b.as_number()) {
    (Some(x), Some(y)) => Ok(Value::Bool(op(x, y))),
    _ => Err("Operands must be numbers.".to_string()),
  }
}
