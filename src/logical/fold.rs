use serde_json::Value;

use crate::{
    functions::{Function, registry},
    logical::{LogicalOperator, PlanError, visitor::LogicalVisitor},
    query::Expression,
};

/// Constant folding. Post-order rewrite replacing any scalar call whose
/// parameters are all constants with the eagerly evaluated result. Aggregates
/// are never folded. Runs after validation, so every function name resolves.
pub fn fold(op: LogicalOperator) -> Result<LogicalOperator, PlanError> {
    ConstantFold.visit(op, &())
}

struct ConstantFold;

impl LogicalVisitor for ConstantFold {
    type Context = ();

    fn visit_expression(&mut self, expression: Expression, ctx: &()) -> Result<Expression, PlanError> {
        let expression = self.walk_expression(expression, ctx)?;
        if let Expression::Function { name, parameters } = &expression {
            if let Some(Function::Scalar(function)) = registry().get(name) {
                let mut args: Vec<Value> = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    match parameter {
                        Expression::Constant(value) => args.push(value.clone()),
                        _ => return Ok(expression),
                    }
                }
                return Ok(Expression::Constant(function.execute(&args)));
            }
        }
        Ok(expression)
    }
}
