use std::sync::Arc;

use serde_json::Value;

use crate::{
    config::EngineConfig,
    functions::{Accumulator, Function, ScalarFunction, registry},
    physical::ExecError,
    query::{Expression, Field},
};

/// Scalar executor: one value per row. Identifiers are resolved once, here,
/// into positional offsets against the upstream layout; evaluation never
/// touches a name again.
pub enum ExprExecutor {
    Constant(Value),
    Column(usize),
    Call { function: Arc<dyn ScalarFunction>, args: Vec<ExprExecutor> },
}

impl ExprExecutor {
    pub fn compile(expression: &Expression, layout: &[Field]) -> Result<Self, ExecError> {
        match expression {
            Expression::Constant(value) => Ok(ExprExecutor::Constant(value.clone())),
            Expression::Identifier(field) => Ok(ExprExecutor::Column(resolve_offset(field, layout)?)),
            Expression::Function { name, parameters } => match registry().get(name) {
                Some(Function::Scalar(function)) => Ok(ExprExecutor::Call {
                    function: function.clone(),
                    args: parameters
                        .iter()
                        .map(|p| ExprExecutor::compile(p, layout))
                        .collect::<Result<_, _>>()?,
                }),
                Some(Function::Aggregate(_)) => Err(ExecError::Internal(format!(
                    "aggregate \"{name}\" compiled in a scalar context"
                ))),
                None => Err(ExecError::Internal(format!(
                    "function \"{name}\" vanished after validation"
                ))),
            },
        }
    }

    pub fn compile_all(expressions: &[Expression], layout: &[Field]) -> Result<Vec<Self>, ExecError> {
        expressions.iter().map(|e| Self::compile(e, layout)).collect()
    }

    pub fn evaluate(&self, row: &[Value]) -> Value {
        match self {
            ExprExecutor::Constant(value) => value.clone(),
            ExprExecutor::Column(offset) => row.get(*offset).cloned().unwrap_or(Value::Null),
            ExprExecutor::Call { function, args } => {
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(row)).collect();
                function.execute(&values)
            }
        }
    }
}

/// Aggregate executor: many rows in, one value out. A scalar call over
/// aggregate sub-expressions forwards rows to its children and applies the
/// scalar function to their results; a group-key column caches the first
/// value it sees, which is representative by construction.
pub enum AggExecutor {
    Constant(Value),
    Column { offset: usize, cached: Option<Value> },
    Scalar { function: Arc<dyn ScalarFunction>, args: Vec<AggExecutor> },
    Aggregate { accumulator: Box<dyn Accumulator>, args: Vec<ExprExecutor> },
}

impl AggExecutor {
    pub fn compile(
        expression: &Expression,
        layout: &[Field],
        config: &EngineConfig,
    ) -> Result<Self, ExecError> {
        match expression {
            Expression::Constant(value) => Ok(AggExecutor::Constant(value.clone())),
            Expression::Identifier(field) => {
                Ok(AggExecutor::Column { offset: resolve_offset(field, layout)?, cached: None })
            }
            Expression::Function { name, parameters } => match registry().get(name) {
                Some(Function::Aggregate(function)) => Ok(AggExecutor::Aggregate {
                    accumulator: function.accumulator(config),
                    args: ExprExecutor::compile_all(parameters, layout)?,
                }),
                Some(Function::Scalar(function)) => Ok(AggExecutor::Scalar {
                    function: function.clone(),
                    args: parameters
                        .iter()
                        .map(|p| AggExecutor::compile(p, layout, config))
                        .collect::<Result<_, _>>()?,
                }),
                None => Err(ExecError::Internal(format!(
                    "function \"{name}\" vanished after validation"
                ))),
            },
        }
    }

    pub fn process_row(&mut self, row: &[Value]) {
        match self {
            AggExecutor::Constant(_) => {}
            AggExecutor::Column { offset, cached } => {
                if cached.is_none() {
                    *cached = Some(row.get(*offset).cloned().unwrap_or(Value::Null));
                }
            }
            AggExecutor::Scalar { args, .. } => {
                for arg in args {
                    arg.process_row(row);
                }
            }
            AggExecutor::Aggregate { accumulator, args } => {
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(row)).collect();
                accumulator.update(&values);
            }
        }
    }

    pub fn result(&self) -> Value {
        match self {
            AggExecutor::Constant(value) => value.clone(),
            AggExecutor::Column { cached, .. } => cached.clone().unwrap_or(Value::Null),
            AggExecutor::Scalar { function, args } => {
                let values: Vec<Value> = args.iter().map(|arg| arg.result()).collect();
                function.execute(&values)
            }
            AggExecutor::Aggregate { accumulator, .. } => accumulator.finalize(),
        }
    }
}

/// Positional resolution. An exact match was proven to exist by validation;
/// the name-only fallback covers layouts whose qualification was rewritten by
/// an enclosing view.
fn resolve_offset(field: &Field, layout: &[Field]) -> Result<usize, ExecError> {
    if let Some(offset) = layout.iter().position(|candidate| candidate == field) {
        return Ok(offset);
    }
    layout
        .iter()
        .position(|candidate| candidate.field_name == field.field_name)
        .ok_or_else(|| {
            ExecError::Internal(format!("column \"{field}\" not found in compiled layout"))
        })
}
