use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::config::EngineConfig;

pub mod aggregate;
pub mod hll;
pub mod inspectors;
pub mod scalar;

/// Row-at-a-time function. Implementations never fail at runtime: bad or
/// missing inputs produce null, matching the engine's null propagation rule.
pub trait ScalarFunction: Send + Sync {
    fn validate_parameter_count(&self, count: usize) -> bool;

    /// Evaluate against already-evaluated arguments (args.len() was checked
    /// during validation).
    fn execute(&self, args: &[Value]) -> Value;
}

/// The per-group running state of an aggregate.
/// The executor will:
///   1) evaluate the function's arguments per row into serde_json::Value
///   2) call `update(&args)` once per row of the group
///   3) call `finalize()` whenever the group's current result is emitted
pub trait Accumulator: Send {
    fn update(&mut self, args: &[Value]);

    fn finalize(&self) -> Value;
}

pub trait AggregateFunction: Send + Sync {
    fn validate_parameter_count(&self, count: usize) -> bool;

    /// Fresh state for one group.
    fn accumulator(&self, config: &EngineConfig) -> Box<dyn Accumulator>;
}

#[derive(Clone)]
pub enum Function {
    Scalar(Arc<dyn ScalarFunction>),
    Aggregate(Arc<dyn AggregateFunction>),
}

impl Function {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Function::Aggregate(_))
    }

    pub fn validate_parameter_count(&self, count: usize) -> bool {
        match self {
            Function::Scalar(f) => f.validate_parameter_count(count),
            Function::Aggregate(f) => f.validate_parameter_count(count),
        }
    }
}

/// Case-insensitive registry of scalar and aggregate functions.
#[derive(Default)]
pub struct FunctionRegistry {
    by_name: HashMap<String, Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self { by_name: HashMap::new() }
    }

    pub fn register_scalar<F: ScalarFunction + 'static>(&mut self, name: &str, function: F) {
        self.by_name.insert(name.to_ascii_lowercase(), Function::Scalar(Arc::new(function)));
    }

    pub fn register_aggregate<F: AggregateFunction + 'static>(&mut self, name: &str, function: F) {
        self.by_name.insert(name.to_ascii_lowercase(), Function::Aggregate(Arc::new(function)));
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.by_name.get(&name.to_ascii_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        let mut v: Vec<_> = self.by_name.keys().cloned().collect();
        v.sort();
        v
    }

    pub fn default_function_registry() -> Self {
        use std::cmp::Ordering;

        let mut registry = Self::new();

        registry.register_scalar("add", scalar::Arithmetic(|a, b| a + b));
        registry.register_scalar("minus", scalar::Arithmetic(|a, b| a - b));
        registry.register_scalar("multiply", scalar::Arithmetic(|a, b| a * b));
        registry.register_scalar("divide", scalar::Arithmetic(|a, b| a / b));

        registry.register_scalar("gt", scalar::Comparison(Ordering::is_gt));
        registry.register_scalar("gte", scalar::Comparison(Ordering::is_ge));
        registry.register_scalar("lt", scalar::Comparison(Ordering::is_lt));
        registry.register_scalar("lte", scalar::Comparison(Ordering::is_le));
        registry.register_scalar("equal", scalar::Equality { negate: false });
        registry.register_scalar("not_equal", scalar::Equality { negate: true });

        registry.register_scalar("idx", scalar::Idx);
        registry.register_scalar("is_null", scalar::IsNull { negate: false });
        registry.register_scalar("is_not_null", scalar::IsNull { negate: true });
        registry.register_scalar("number", scalar::ToNumber);
        registry.register_scalar("string", scalar::ToString);
        registry.register_scalar("and", scalar::And);
        registry.register_scalar("or", scalar::Or);
        registry.register_scalar("not", scalar::Not);
        registry.register_scalar("coalesce", scalar::Coalesce);
        registry.register_scalar("timestamp", scalar::Timestamp);
        registry.register_scalar("tumble", scalar::Tumble);
        registry.register_scalar("hopping", scalar::Hopping);

        registry.register_aggregate("count", aggregate::Count);
        registry.register_aggregate("sum", aggregate::Sum);
        registry.register_aggregate("min", aggregate::Extrema { take_greater: false });
        registry.register_aggregate("max", aggregate::Extrema { take_greater: true });
        registry.register_aggregate("max_row", aggregate::MaxRow);
        registry.register_aggregate("count_distinct", aggregate::CountDistinct);

        registry
    }
}

/// The process-wide registry all plans resolve against.
pub fn registry() -> &'static FunctionRegistry {
    static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::default_function_registry);
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_and_lookup_is_case_insensitive() {
        let r = FunctionRegistry::default_function_registry();
        assert_eq!(
            r.list(),
            vec![
                "add",
                "and",
                "coalesce",
                "count",
                "count_distinct",
                "divide",
                "equal",
                "gt",
                "gte",
                "hopping",
                "idx",
                "is_not_null",
                "is_null",
                "lt",
                "lte",
                "max",
                "max_row",
                "min",
                "minus",
                "multiply",
                "not",
                "not_equal",
                "number",
                "or",
                "string",
                "sum",
                "timestamp",
                "tumble",
            ]
        );

        assert!(r.get("COUNT").is_some());
        assert!(r.get("aDd").is_some());
        assert!(r.get("nope").is_none());
    }

    #[test]
    fn aggregates_are_flagged() {
        let r = FunctionRegistry::default_function_registry();
        assert!(r.get("count").unwrap().is_aggregate());
        assert!(r.get("count_distinct").unwrap().is_aggregate());
        assert!(!r.get("add").unwrap().is_aggregate());
    }

    #[test]
    fn parameter_counts_route_to_the_implementation() {
        let r = FunctionRegistry::default_function_registry();
        assert!(r.get("add").unwrap().validate_parameter_count(2));
        assert!(!r.get("add").unwrap().validate_parameter_count(3));
        assert!(r.get("count").unwrap().validate_parameter_count(0));
        assert!(r.get("count").unwrap().validate_parameter_count(1));
        assert!(!r.get("count").unwrap().validate_parameter_count(2));
        assert!(r.get("coalesce").unwrap().validate_parameter_count(4));
    }
}
