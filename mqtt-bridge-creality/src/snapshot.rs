//! Printer telemetry snapshots.
//!
//! The printer pushes a JSON object on every WebSocket message. Any key may be
//! absent from any given message, and the same logical field arrives as an
//! integer, a float or a numeric string depending on firmware and message
//! variant. The accessors here coerce defensively and report a mismatch as
//! "not present".

use serde_json::{Map, Value};

/// One decoded telemetry message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// Decode a snapshot. Anything other than a JSON object is rejected.
    pub fn parse(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data).map(Self)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterate over keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Field as a float.
    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(coerce_float)
    }

    /// Field as an integer.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(coerce_int)
    }

    /// Field as a string, without conversion.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Nested object field.
    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Coerce a number or numeric string to a finite float.
pub fn coerce_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// Coerce a number or numeric string to an integer, truncating fractions.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| coerce_float(value).map(|f| f as i64)),
        _ => None,
    }
}

/// Truncate a JSON number to an integer; anything else is 0.
pub fn number_or_zero(value: &Value) -> i64 {
    match value {
        Value::Number(_) => coerce_int(value).unwrap_or(0),
        _ => 0,
    }
}

/// Canonical string form of a scalar value.
///
/// Numeric strings are reformatted to three decimals, other strings pass
/// through. Numbers use their shortest representation. Objects and arrays
/// have no scalar form.
pub fn scalar_payload(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(match s.parse::<f64>() {
            Ok(f) => format!("{:.3}", f),
            Err(_) => s.clone(),
        }),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        }),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}
