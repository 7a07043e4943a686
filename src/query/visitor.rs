use serde_json::Value;

use crate::query::{
    Expression, Field, NamedExpr, OrderExpr, Query, Select, SelectSource, Table,
    scope::{Location, Scope},
};

/// Rebuild-the-tree traversal over the query model. Every node kind has a
/// default `walk_*` rule that reconstructs the node from its recursively
/// visited children, and a `visit_*` override point. Overrides that still
/// want descendants visited must call the matching `walk_*` themselves.
///
/// Expression visits receive the [`Scope`] for the clause they sit in, so a
/// pass can tell a WHERE identifier from a JOIN-condition identifier.
pub trait QueryVisitor {
    type Context;

    fn visit_query(&mut self, node: Query, ctx: &mut Self::Context) -> Query {
        self.walk_query(node, ctx)
    }

    fn walk_query(&mut self, node: Query, ctx: &mut Self::Context) -> Query {
        match node {
            Query::Select(select) => Query::Select(self.visit_select(select, ctx)),
            Query::Describe { table, table_output } => {
                Query::Describe { table: self.visit_table(table, ctx), table_output }
            }
            Query::Explain(inner) => Query::Explain(Box::new(self.visit_query(*inner, ctx))),
            Query::Insert { query, table } => Query::Insert {
                query: Box::new(self.visit_query(*query, ctx)),
                table: self.visit_table(table, ctx),
            },
        }
    }

    fn visit_select(&mut self, node: Select, ctx: &mut Self::Context) -> Select {
        self.walk_select(node, ctx)
    }

    fn walk_select(&mut self, node: Select, ctx: &mut Self::Context) -> Select {
        let scope = node.inner_scope();
        let expressions = node
            .expressions
            .into_iter()
            .map(|e| self.visit_named(e, &scope.at(Location::Project), ctx))
            .collect();
        let predicate = node
            .predicate
            .map(|p| self.visit_expr(p, &scope.at(Location::Where), ctx));
        let group_by = node.group_by.map(|keys| {
            keys.into_iter()
                .map(|e| self.visit_expr(e, &scope.at(Location::GroupBy), ctx))
                .collect()
        });
        let order_by = node.order_by.map(|keys| {
            keys.into_iter()
                .map(|e| self.visit_order(e, &scope.at(Location::OrderBy), ctx))
                .collect()
        });
        let source = self.visit_source(node.source, ctx);
        Select { expressions, source, predicate, group_by, order_by, limit: node.limit }
    }

    fn visit_source(&mut self, node: SelectSource, ctx: &mut Self::Context) -> SelectSource {
        self.walk_source(node, ctx)
    }

    fn walk_source(&mut self, node: SelectSource, ctx: &mut Self::Context) -> SelectSource {
        match node {
            SelectSource::JustATable { table, alias } => {
                SelectSource::JustATable { table: self.visit_table(table, ctx), alias }
            }
            SelectSource::InlineView { inner, alias } => {
                SelectSource::InlineView { inner: Box::new(self.visit_query(*inner, ctx)), alias }
            }
            SelectSource::LateralView { source, expression } => {
                let scope = source.outer_scope().at(Location::LateralView);
                let expression = self.visit_named(expression, &scope, ctx);
                SelectSource::LateralView { source: Box::new(self.visit_source(*source, ctx)), expression }
            }
            SelectSource::Join { left, right, condition } => {
                let scope = left
                    .outer_scope()
                    .merge(&right.outer_scope())
                    .at(Location::JoinCondition);
                let condition = self.visit_expr(condition, &scope, ctx);
                SelectSource::Join {
                    left: Box::new(self.visit_source(*left, ctx)),
                    right: Box::new(self.visit_source(*right, ctx)),
                    condition,
                }
            }
        }
    }

    fn visit_named(&mut self, node: NamedExpr, scope: &Scope, ctx: &mut Self::Context) -> NamedExpr {
        NamedExpr { expression: self.visit_expr(node.expression, scope, ctx), alias: node.alias }
    }

    fn visit_order(&mut self, node: OrderExpr, scope: &Scope, ctx: &mut Self::Context) -> OrderExpr {
        OrderExpr { expression: self.visit_expr(node.expression, scope, ctx), ascending: node.ascending }
    }

    fn visit_expr(&mut self, node: Expression, scope: &Scope, ctx: &mut Self::Context) -> Expression {
        self.walk_expr(node, scope, ctx)
    }

    fn walk_expr(&mut self, node: Expression, scope: &Scope, ctx: &mut Self::Context) -> Expression {
        match node {
            Expression::Function { name, parameters } => self.visit_function(name, parameters, scope, ctx),
            Expression::Constant(value) => self.visit_constant(value, scope, ctx),
            Expression::Identifier(field) => self.visit_identifier(field, scope, ctx),
        }
    }

    fn visit_function(
        &mut self,
        name: String,
        parameters: Vec<Expression>,
        scope: &Scope,
        ctx: &mut Self::Context,
    ) -> Expression {
        self.walk_function(name, parameters, scope, ctx)
    }

    fn walk_function(
        &mut self,
        name: String,
        parameters: Vec<Expression>,
        scope: &Scope,
        ctx: &mut Self::Context,
    ) -> Expression {
        Expression::Function {
            name,
            parameters: parameters.into_iter().map(|p| self.visit_expr(p, scope, ctx)).collect(),
        }
    }

    fn visit_constant(&mut self, value: Value, _scope: &Scope, _ctx: &mut Self::Context) -> Expression {
        Expression::Constant(value)
    }

    fn visit_identifier(&mut self, field: Field, _scope: &Scope, _ctx: &mut Self::Context) -> Expression {
        Expression::Identifier(field)
    }

    fn visit_table(&mut self, node: Table, _ctx: &mut Self::Context) -> Table {
        node
    }
}
