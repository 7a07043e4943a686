use serde_json::Value;

use crate::{
    config::EngineConfig,
    functions::{Accumulator, AggregateFunction, hll::HyperLogLog, inspectors::Inspectors},
};

/// `count()` counts rows, `count(expr)` counts non-null values.
pub struct Count;

impl AggregateFunction for Count {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count <= 1
    }

    fn accumulator(&self, _config: &EngineConfig) -> Box<dyn Accumulator> {
        Box::new(CountAcc { count: 0 })
    }
}

struct CountAcc {
    count: i64,
}

impl Accumulator for CountAcc {
    fn update(&mut self, args: &[Value]) {
        if args.is_empty() || !args[0].is_null() {
            self.count += 1;
        }
    }

    fn finalize(&self) -> Value {
        Value::Number(serde_json::Number::from(self.count))
    }
}

/// Numeric sum, null when no numeric input was seen.
pub struct Sum;

impl AggregateFunction for Sum {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn accumulator(&self, _config: &EngineConfig) -> Box<dyn Accumulator> {
        Box::new(SumAcc { total: None })
    }
}

struct SumAcc {
    total: Option<f64>,
}

impl Accumulator for SumAcc {
    fn update(&mut self, args: &[Value]) {
        if let Some(x) = Inspectors::number(&args[0]) {
            self.total = Some(self.total.unwrap_or(0.0) + x);
        }
    }

    fn finalize(&self) -> Value {
        match self.total {
            Some(total) => Inspectors::to_number(total),
            None => Value::Null,
        }
    }
}

/// min / max under the engine's total order. Null inputs are skipped so a
/// group of nulls yields null rather than ranking null as the minimum.
pub struct Extrema {
    pub take_greater: bool,
}

impl AggregateFunction for Extrema {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn accumulator(&self, _config: &EngineConfig) -> Box<dyn Accumulator> {
        Box::new(ExtremaAcc { take_greater: self.take_greater, best: None })
    }
}

struct ExtremaAcc {
    take_greater: bool,
    best: Option<Value>,
}

impl Accumulator for ExtremaAcc {
    fn update(&mut self, args: &[Value]) {
        let candidate = &args[0];
        if candidate.is_null() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some(best) => {
                let ord = Inspectors::compare_for_sort(candidate, best);
                if self.take_greater { ord.is_gt() } else { ord.is_lt() }
            }
        };
        if replace {
            self.best = Some(candidate.clone());
        }
    }

    fn finalize(&self) -> Value {
        self.best.clone().unwrap_or(Value::Null)
    }
}

/// `max_row(key, value)`: the value carried by the row whose key is largest.
pub struct MaxRow;

impl AggregateFunction for MaxRow {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 2
    }

    fn accumulator(&self, _config: &EngineConfig) -> Box<dyn Accumulator> {
        Box::new(MaxRowAcc { best: None })
    }
}

struct MaxRowAcc {
    best: Option<(Value, Value)>,
}

impl Accumulator for MaxRowAcc {
    fn update(&mut self, args: &[Value]) {
        let key = &args[0];
        if key.is_null() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some((best_key, _)) => Inspectors::compare_for_sort(key, best_key).is_gt(),
        };
        if replace {
            self.best = Some((key.clone(), args[1].clone()));
        }
    }

    fn finalize(&self) -> Value {
        match &self.best {
            Some((_, value)) => value.clone(),
            None => Value::Null,
        }
    }
}

/// Approximate distinct count over a HyperLogLog sketch. Values are keyed by
/// their canonical serialization, so `1` and `1.0` that serialize differently
/// count as distinct.
pub struct CountDistinct;

impl AggregateFunction for CountDistinct {
    fn validate_parameter_count(&self, count: usize) -> bool {
        count == 1
    }

    fn accumulator(&self, config: &EngineConfig) -> Box<dyn Accumulator> {
        Box::new(CountDistinctAcc { sketch: HyperLogLog::new(config.distinct_precision) })
    }
}

struct CountDistinctAcc {
    sketch: HyperLogLog,
}

impl Accumulator for CountDistinctAcc {
    fn update(&mut self, args: &[Value]) {
        if args[0].is_null() {
            return;
        }
        self.sketch.insert(&Inspectors::canonical(&args[..1]));
    }

    fn finalize(&self) -> Value {
        Inspectors::to_number(self.sketch.estimate().round())
    }
}
