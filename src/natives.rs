//! Native (host-provided) functions installed into every VM's global scope.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::Value;

/// Milliseconds since the Unix epoch, as a `Value::Number`.
pub fn clock(_args: &[Value]) -> Result<Value, String> {
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_err(|_| "System clock is before the Unix epoch.".to_string())?;
  Ok(Value::Number(now.as_millis() as f64))
}
