use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

use crate::functions::{ScalarFunction, inspectors::Inspectors};

/// Binary arithmetic over f64. Either side failing the number coercion makes
/// the result null.
pub struct Arithmetic(pub fn(f64, f64) -> f64);

impl ScalarFunction for Arithmetic {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        match (Inspectors::number(&args[0]), Inspectors::number(&args[1])) {
            (Some(a), Some(b)) => Inspectors::to_number((self.0)(a, b)),
            _ => Value::Null,
        }
    }
}

/// gt / gte / lt / lte, driven by a predicate over the comparison result.
pub struct Comparison(pub fn(Ordering) -> bool);

impl ScalarFunction for Comparison {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        match Inspectors::compare(&args[0], &args[1]) {
            Some(ord) => Value::Bool((self.0)(ord)),
            None => Value::Null,
        }
    }
}

/// equal / not_equal. Numbers compare by value so `1` equals `1.0`; any null
/// side makes the result null; everything else is structural equality.
pub struct Equality {
    pub negate: bool,
}

impl ScalarFunction for Equality {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        let (a, b) = (&args[0], &args[1]);
        if a.is_null() || b.is_null() {
            return Value::Null;
        }
        let equal = match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        };
        Value::Bool(equal != self.negate)
    }
}

/// Member access: `idx(object, 'key')` or `idx(array, index)`. Missing
/// members and shape mismatches resolve to null.
pub struct Idx;

impl ScalarFunction for Idx {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        match (&args[0], &args[1]) {
            (Value::Object(entries), Value::String(key)) => {
                entries.get(key).cloned().unwrap_or(Value::Null)
            }
            (Value::Array(items), Value::Number(n)) => match n.as_u64() {
                Some(i) => items.get(i as usize).cloned().unwrap_or(Value::Null),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

pub struct IsNull {
    pub negate: bool,
}

impl ScalarFunction for IsNull {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        Value::Bool(args[0].is_null() != self.negate)
    }
}

pub struct ToNumber;

impl ScalarFunction for ToNumber {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        if let Value::Number(_) = &args[0] {
            return args[0].clone();
        }
        match Inspectors::number(&args[0]) {
            Some(x) => Inspectors::to_number(x),
            None => Value::Null,
        }
    }
}

pub struct ToString;

impl ScalarFunction for ToString {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        match Inspectors::string(&args[0]) {
            Some(s) => Value::String(s),
            None => Value::Null,
        }
    }
}

/// Three-valued AND: false wins over unknown, unknown wins over true.
pub struct And;

impl ScalarFunction for And {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        let sides = [Inspectors::boolean(&args[0]), Inspectors::boolean(&args[1])];
        if sides.contains(&Some(false)) {
            return Value::Bool(false);
        }
        if sides.contains(&None) {
            return Value::Null;
        }
        Value::Bool(true)
    }
}

/// Three-valued OR: true wins over unknown, unknown wins over false.
pub struct Or;

impl ScalarFunction for Or {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        let sides = [Inspectors::boolean(&args[0]), Inspectors::boolean(&args[1])];
        if sides.contains(&Some(true)) {
            return Value::Bool(true);
        }
        if sides.contains(&None) {
            return Value::Null;
        }
        Value::Bool(false)
    }
}

pub struct Not;

impl ScalarFunction for Not {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        match Inspectors::boolean(&args[0]) {
            Some(b) => Value::Bool(!b),
            None => Value::Null,
        }
    }
}

pub struct Coalesce;

impl ScalarFunction for Coalesce {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count >= 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)
    }
}

/// Normalizes a timestamp to epoch milliseconds. Numbers are assumed to be
/// milliseconds already; strings are parsed as RFC 3339.
pub struct Timestamp;

impl ScalarFunction for Timestamp {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn execute(&self, args: &[Value]) -> Value {
        match &args[0] {
            Value::Number(_) => args[0].clone(),
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Value::Number(serde_json::Number::from(dt.timestamp_millis())),
                Err(_) => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

fn window_start(ts: f64, stride: f64) -> Value {
    if stride <= 0.0 {
        return Value::Null;
    }
    Inspectors::to_number((ts / stride).floor() * stride)
}

/// `tumble(ts, width)`: start of the fixed-width window containing `ts`.
pub struct Tumble;

impl ScalarFunction for Tumble {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn execute(&self, args: &[Value]) -> Value {
        match (Inspectors::number(&args[0]), Inspectors::number(&args[1])) {
            (Some(ts), Some(width)) => window_start(ts, width),
            _ => Value::Null,
        }
    }
}

/// `hopping(ts, width, advance)`: start of the most recent hop containing
/// `ts`. Windows advance by `advance`; `width` only has to be a positive
/// number, the grouping key is the hop start.
pub struct Hopping;

impl ScalarFunction for Hopping {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 3
    }

    fn execute(&self, args: &[Value]) -> Value {
        match (
            Inspectors::number(&args[0]),
            Inspectors::number(&args[1]),
            Inspectors::number(&args[2]),
        ) {
            (Some(ts), Some(width), Some(advance)) if width > 0.0 => window_start(ts, advance),
            _ => Value::Null,
        }
    }
}
