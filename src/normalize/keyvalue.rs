//! Key=value output parsing (nuttcp-style throughput instrumentation).

use std::collections::BTreeMap;

use serde_json::{Number, Value};

/// Parse whitespace-separated `key=value` tokens into a typed map.
///
/// Each token splits on its first `=`. Values containing a decimal point
/// are coerced to floats, purely numeric values to integers, and anything
/// else stays a raw string (malformed values are kept, not dropped).
/// Tokens without `=` are skipped.
pub fn parse_key_values(text: &str) -> BTreeMap<String, Value> {
    let mut results = BTreeMap::new();

    for token in text.split_whitespace() {
        let (key, value) = match token.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        results.insert(key.to_string(), coerce(value));
    }

    results
}

fn coerce(value: &str) -> Value {
    if value.contains('.') {
        if let Ok(f) = value.parse::<f64>() {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    } else if let Ok(i) = value.parse::<i64>() {
        return Value::Number(i.into());
    }
    Value::String(value.to_string())
}
