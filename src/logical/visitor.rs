use crate::{
    logical::{LogicalOperator, PlanError},
    query::{Expression, NamedExpr, OrderExpr},
};

/// Rebuild traversal over the logical plan, children before parents. Passes
/// override `visit` for operator rewrites or `visit_expression` for
/// expression rewrites; either override must call the matching `walk_*` to
/// keep descending.
pub trait LogicalVisitor {
    type Context;

    fn visit(
        &mut self,
        op: LogicalOperator,
        ctx: &Self::Context,
    ) -> Result<LogicalOperator, PlanError> {
        self.walk(op, ctx)
    }

    fn walk(
        &mut self,
        op: LogicalOperator,
        ctx: &Self::Context,
    ) -> Result<LogicalOperator, PlanError> {
        Ok(match op {
            LogicalOperator::Project { expressions, source, alias } => LogicalOperator::Project {
                source: Box::new(self.visit(*source, ctx)?),
                expressions: self.visit_named_list(expressions, ctx)?,
                alias,
            },
            LogicalOperator::LateralView { expression, source } => LogicalOperator::LateralView {
                source: Box::new(self.visit(*source, ctx)?),
                expression: self.visit_named(expression, ctx)?,
            },
            LogicalOperator::Filter { predicate, source } => LogicalOperator::Filter {
                source: Box::new(self.visit(*source, ctx)?),
                predicate: self.visit_expression(predicate, ctx)?,
            },
            LogicalOperator::Sort { keys, source } => LogicalOperator::Sort {
                source: Box::new(self.visit(*source, ctx)?),
                keys: keys
                    .into_iter()
                    .map(|key| {
                        Ok(OrderExpr {
                            expression: self.visit_expression(key.expression, ctx)?,
                            ascending: key.ascending,
                        })
                    })
                    .collect::<Result<_, PlanError>>()?,
            },
            LogicalOperator::Limit { limit, source } => {
                LogicalOperator::Limit { limit, source: Box::new(self.visit(*source, ctx)?) }
            }
            LogicalOperator::Explain { source } => {
                LogicalOperator::Explain { source: Box::new(self.visit(*source, ctx)?) }
            }
            LogicalOperator::GroupBy { expressions, group_by, source, alias } => {
                LogicalOperator::GroupBy {
                    source: Box::new(self.visit(*source, ctx)?),
                    expressions: self.visit_named_list(expressions, ctx)?,
                    group_by: group_by
                        .into_iter()
                        .map(|key| self.visit_expression(key, ctx))
                        .collect::<Result<_, PlanError>>()?,
                    alias,
                }
            }
            LogicalOperator::Join { left, right, condition } => LogicalOperator::Join {
                left: Box::new(self.visit(*left, ctx)?),
                right: Box::new(self.visit(*right, ctx)?),
                condition: self.visit_expression(condition, ctx)?,
            },
            LogicalOperator::Gather { source } => {
                LogicalOperator::Gather { source: Box::new(self.visit(*source, ctx)?) }
            }
            LogicalOperator::Write { table, source } => {
                LogicalOperator::Write { table, source: Box::new(self.visit(*source, ctx)?) }
            }
            leaf @ (LogicalOperator::Describe { .. } | LogicalOperator::DataSource { .. }) => leaf,
        })
    }

    fn visit_named(
        &mut self,
        named: NamedExpr,
        ctx: &Self::Context,
    ) -> Result<NamedExpr, PlanError> {
        Ok(NamedExpr { expression: self.visit_expression(named.expression, ctx)?, alias: named.alias })
    }

    fn visit_named_list(
        &mut self,
        list: Vec<NamedExpr>,
        ctx: &Self::Context,
    ) -> Result<Vec<NamedExpr>, PlanError> {
        list.into_iter().map(|named| self.visit_named(named, ctx)).collect()
    }

    fn visit_expression(
        &mut self,
        expression: Expression,
        ctx: &Self::Context,
    ) -> Result<Expression, PlanError> {
        self.walk_expression(expression, ctx)
    }

    fn walk_expression(
        &mut self,
        expression: Expression,
        ctx: &Self::Context,
    ) -> Result<Expression, PlanError> {
        Ok(match expression {
            Expression::Function { name, parameters } => Expression::Function {
                name,
                parameters: parameters
                    .into_iter()
                    .map(|p| self.visit_expression(p, ctx))
                    .collect::<Result<_, PlanError>>()?,
            },
            other => other,
        })
    }
}
