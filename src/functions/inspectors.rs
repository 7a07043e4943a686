use std::cmp::Ordering;

use serde_json::Value;

/// Value coercions shared by the scalar and aggregate implementations.
/// Every inspector returns `None` when the value cannot be read as the
/// requested shape, which callers turn into null propagation.
pub struct Inspectors;

impl Inspectors {
    pub fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn boolean(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn array(value: &Value) -> Option<&Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn map(value: &Value) -> Option<&serde_json::Map<String, Value>> {
        match value {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Renders an f64 back into a JSON number, preferring an integer when the
    /// value has no fractional part. Non-finite results become null since JSON
    /// has no representation for them.
    pub fn to_number(x: f64) -> Value {
        if !x.is_finite() {
            return Value::Null;
        }
        if x.fract() == 0.0 && x.abs() < (i64::MAX as f64) {
            return Value::Number(serde_json::Number::from(x as i64));
        }
        serde_json::Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }

    /// Stable key form for grouping and distinct counting.
    pub fn canonical(values: &[Value]) -> String {
        serde_json::to_string(values).unwrap_or_default()
    }

    /// Comparison used by the boolean operators. `None` when either side is
    /// null, so `gt(null, 1)` stays null instead of quietly picking an order.
    /// Sides of different types compare by their string renderings.
    pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => Some(Self::rendering(a).cmp(&Self::rendering(b))),
        }
    }

    fn rendering(value: &Value) -> String {
        Self::string(value).unwrap_or_else(|| value.to_string())
    }

    /// Total order over JSON values for sorting and extrema. Null ranks below
    /// everything, numbers compare as f64, mixed types fall back to a type
    /// rank, and containers compare by their canonical serialization.
    pub fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
        use Ordering::*;
        match (a, b) {
            (Value::Null, Value::Null) => Equal,
            (Value::Null, _) => Less,
            (_, Value::Null) => Greater,
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let ax = x.as_f64().unwrap_or(f64::NAN);
                let by = y.as_f64().unwrap_or(f64::NAN);
                ax.partial_cmp(&by).unwrap_or(Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
                let sa = serde_json::to_string(a).unwrap_or_default();
                let sb = serde_json::to_string(b).unwrap_or_default();
                sa.cmp(&sb)
            }
            (lhs, rhs) => Self::type_rank(lhs).cmp(&Self::type_rank(rhs)),
        }
    }

    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
}
