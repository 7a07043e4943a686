use crate::{
    functions::registry,
    logical::{LogicalOperator, PlanError},
    query::{Expression, Query, Select, SelectSource},
};

/// Structural translation from the query model into logical operators. No
/// validation beyond what is needed to pick an operator shape; the dedicated
/// passes handle the rest.
pub fn build(query: Query) -> Result<LogicalOperator, PlanError> {
    match query {
        Query::Select(select) => build_select(select, None),
        Query::Describe { table, table_output } => {
            Ok(LogicalOperator::Describe { table, table_output })
        }
        Query::Explain(inner) => Ok(LogicalOperator::Explain { source: Box::new(build(*inner)?) }),
        Query::Insert { query, table } => {
            Ok(LogicalOperator::Write { table, source: Box::new(build(*query)?) })
        }
    }
}

fn build_select(select: Select, alias: Option<String>) -> Result<LogicalOperator, PlanError> {
    let mut op = build_source(select.source)?;

    if let Some(predicate) = select.predicate {
        op = LogicalOperator::Filter { predicate, source: Box::new(op) };
    }

    // An explicit GROUP BY, or any aggregate call in the projection, makes
    // this a grouping select. An aggregate with no keys still groups: it
    // produces exactly one row.
    let aggregating = select.group_by.is_some()
        || select
            .expressions
            .iter()
            .map(|named| contains_aggregate(&named.expression))
            .try_fold(false, |acc, found| Ok::<_, PlanError>(acc || found?))?;

    op = if aggregating {
        LogicalOperator::GroupBy {
            expressions: select.expressions,
            group_by: select.group_by.unwrap_or_default(),
            source: Box::new(op),
            alias,
        }
    } else {
        LogicalOperator::Project { expressions: select.expressions, source: Box::new(op), alias }
    };

    if let Some(keys) = select.order_by {
        op = LogicalOperator::Sort { keys, source: Box::new(op) };
    }
    if let Some(limit) = select.limit {
        op = LogicalOperator::Limit { limit, source: Box::new(op) };
    }
    Ok(op)
}

fn build_source(source: SelectSource) -> Result<LogicalOperator, PlanError> {
    match source {
        SelectSource::JustATable { table, alias } => Ok(LogicalOperator::DataSource { table, alias }),
        SelectSource::InlineView { inner, alias } => match *inner {
            Query::Select(select) => build_select(select, alias),
            _ => Err(PlanError::UnsupportedInlineView),
        },
        SelectSource::LateralView { source, expression } => {
            if expression.alias.is_none() {
                return Err(PlanError::MissingLateralAlias);
            }
            Ok(LogicalOperator::LateralView { expression, source: Box::new(build_source(*source)?) })
        }
        SelectSource::Join { left, right, condition } => Ok(LogicalOperator::Join {
            left: Box::new(build_source(*left)?),
            right: Box::new(build_source(*right)?),
            condition,
        }),
    }
}

/// Whether the expression transitively calls an aggregate function. Unknown
/// function names fail fast here since the answer decides the plan shape.
fn contains_aggregate(expression: &Expression) -> Result<bool, PlanError> {
    match expression {
        Expression::Function { name, parameters } => {
            let function = registry()
                .get(name)
                .ok_or_else(|| PlanError::FunctionNotFound(name.clone()))?;
            if function.is_aggregate() {
                return Ok(true);
            }
            for parameter in parameters {
                if contains_aggregate(parameter)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expression::Constant(_) | Expression::Identifier(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Field, NamedExpr, OrderExpr, Table, TableType};
    use serde_json::json;

    fn table_source(alias: &str) -> SelectSource {
        SelectSource::JustATable {
            table: Table::new(TableType::Json, "data.json"),
            alias: Some(alias.to_string()),
        }
    }

    #[test]
    fn plain_select_becomes_project_over_data_source() {
        let query = Query::Select(Select::simple(
            vec![NamedExpr::new(Expression::ident(Field::new("t", "a")), None)],
            table_source("t"),
        ));
        let op = build(query).unwrap();
        assert!(matches!(
            op,
            LogicalOperator::Project { ref source, alias: None, .. }
                if matches!(**source, LogicalOperator::DataSource { .. })
        ));
    }

    #[test]
    fn aggregate_without_group_by_becomes_group_by_with_empty_keys() {
        let query = Query::Select(Select::simple(
            vec![NamedExpr::new(Expression::func("count", vec![]), None)],
            table_source("t"),
        ));
        match build(query).unwrap() {
            LogicalOperator::GroupBy { group_by, .. } => assert!(group_by.is_empty()),
            other => panic!("expected group by, got {other:?}"),
        }
    }

    #[test]
    fn unknown_function_fails_fast_during_build() {
        let query = Query::Select(Select::simple(
            vec![NamedExpr::new(Expression::func("no_such_fn", vec![]), None)],
            table_source("t"),
        ));
        assert_eq!(build(query), Err(PlanError::FunctionNotFound("no_such_fn".into())));
    }

    #[test]
    fn clause_stack_orders_filter_sort_limit() {
        let mut select = Select::simple(
            vec![NamedExpr::new(Expression::ident(Field::new("t", "a")), None)],
            table_source("t"),
        );
        select.predicate = Some(Expression::Constant(json!(true)));
        select.order_by = Some(vec![OrderExpr {
            expression: Expression::ident(Field::new("t", "a")),
            ascending: false,
        }]);
        select.limit = Some(2);

        // Limit(Sort(Project(Filter(DataSource))))
        let op = build(Query::Select(select)).unwrap();
        let LogicalOperator::Limit { limit, source } = op else { panic!("expected limit") };
        assert_eq!(limit, 2);
        let LogicalOperator::Sort { source, .. } = *source else { panic!("expected sort") };
        let LogicalOperator::Project { source, .. } = *source else { panic!("expected project") };
        assert!(matches!(*source, LogicalOperator::Filter { .. }));
    }

    #[test]
    fn inline_view_must_be_a_select() {
        let query = Query::Select(Select::simple(
            vec![NamedExpr::new(Expression::ident(Field::unqualified("plan")), None)],
            SelectSource::InlineView {
                inner: Box::new(Query::Describe {
                    table: Table::new(TableType::Json, "t"),
                    table_output: false,
                }),
                alias: Some("v".into()),
            },
        ));
        assert_eq!(build(query), Err(PlanError::UnsupportedInlineView));
    }

    #[test]
    fn lateral_view_requires_an_alias() {
        let query = Query::Select(Select::simple(
            vec![NamedExpr::new(Expression::ident(Field::unqualified("tag")), None)],
            SelectSource::LateralView {
                source: Box::new(table_source("t")),
                expression: NamedExpr::new(Expression::ident(Field::new("t", "tags")), None),
            },
        ));
        assert_eq!(build(query), Err(PlanError::MissingLateralAlias));
    }

    #[test]
    fn insert_wraps_the_select_in_a_write() {
        let query = Query::Insert {
            query: Box::new(Query::Select(Select::simple(
                vec![NamedExpr::new(Expression::ident(Field::new("t", "a")), None)],
                table_source("t"),
            ))),
            table: Table::new(TableType::Json, "out.json"),
        };
        assert!(matches!(build(query).unwrap(), LogicalOperator::Write { .. }));
    }
}
