use crate::{
    functions::registry,
    logical::{LogicalOperator, PlanError},
    query::{Expression, Field},
};

/// Semantic validation, run after field pushdown so every DataSource already
/// exposes its required fields. Checks, for the whole tree:
///   - every qualified identifier appears in the children's exposed fields
///   - every unqualified identifier matches exactly one exposed field
///   - every function exists and accepts its parameter count
///   - aggregates appear only in a GroupBy projection, never nested
pub fn validate(op: &LogicalOperator) -> Result<(), PlanError> {
    for child in op.children() {
        validate(child)?;
    }
    let exposed: Vec<Field> = op.children().iter().flat_map(|child| child.fields()).collect();

    match op {
        LogicalOperator::Project { expressions, .. } => {
            for named in expressions {
                validate_expression(&named.expression, &exposed, false)?;
            }
        }
        LogicalOperator::GroupBy { expressions, group_by, .. } => {
            for named in expressions {
                validate_expression(&named.expression, &exposed, true)?;
            }
            for key in group_by {
                validate_expression(key, &exposed, false)?;
            }
        }
        LogicalOperator::Filter { predicate, .. } => {
            validate_expression(predicate, &exposed, false)?;
        }
        LogicalOperator::Sort { keys, .. } => {
            for key in keys {
                validate_expression(&key.expression, &exposed, false)?;
            }
        }
        LogicalOperator::Join { condition, .. } => {
            validate_expression(condition, &exposed, false)?;
        }
        LogicalOperator::LateralView { expression, .. } => {
            if expression.alias.is_none() {
                return Err(PlanError::MissingLateralAlias);
            }
            validate_expression(&expression.expression, &exposed, false)?;
        }
        LogicalOperator::Limit { .. }
        | LogicalOperator::Describe { .. }
        | LogicalOperator::DataSource { .. }
        | LogicalOperator::Explain { .. }
        | LogicalOperator::Gather { .. }
        | LogicalOperator::Write { .. } => {}
    }
    Ok(())
}

fn validate_expression(
    expression: &Expression,
    exposed: &[Field],
    aggregates_allowed: bool,
) -> Result<(), PlanError> {
    match expression {
        Expression::Constant(_) => Ok(()),
        Expression::Identifier(field) => resolve(field, exposed).map(|_| ()),
        Expression::Function { name, parameters } => {
            let function = registry()
                .get(name)
                .ok_or_else(|| PlanError::FunctionNotFound(name.clone()))?;
            if !function.validate_parameter_count(parameters.len()) {
                return Err(PlanError::FunctionArity { name: name.clone(), count: parameters.len() });
            }
            if function.is_aggregate() && !aggregates_allowed {
                return Err(PlanError::AggregateNotAllowed(name.clone()));
            }
            // Aggregate arguments are per-row expressions; nesting another
            // aggregate inside them is rejected.
            let inner_allowed = aggregates_allowed && !function.is_aggregate();
            for parameter in parameters {
                validate_expression(parameter, exposed, inner_allowed)?;
            }
            Ok(())
        }
    }
}

/// Resolves an identifier against the exposed fields, the same rule the
/// expression compiler applies positionally later.
pub fn resolve(field: &Field, exposed: &[Field]) -> Result<usize, PlanError> {
    if field.table_alias.is_some() {
        return exposed.iter().position(|candidate| candidate == field).ok_or_else(|| {
            PlanError::ColumnNotFound {
                field: field.to_string(),
                available: exposed.iter().map(Field::to_string).collect(),
            }
        });
    }
    let matches: Vec<usize> = exposed
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.field_name == field.field_name)
        .map(|(index, _)| index)
        .collect();
    match matches.as_slice() {
        [] => Err(PlanError::ColumnNotFound {
            field: field.to_string(),
            available: exposed.iter().map(Field::to_string).collect(),
        }),
        [index] => Ok(*index),
        _ => Err(PlanError::AmbiguousColumn {
            field: field.to_string(),
            matches: matches.iter().map(|&i| exposed[i].to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NamedExpr, Table, TableType};
    use serde_json::json;

    fn data_source(alias: &str, fields: &[&str]) -> LogicalOperator {
        let mut table = Table::new(TableType::Json, "t");
        table.fields = fields.iter().map(|s| s.to_string()).collect();
        LogicalOperator::DataSource { table, alias: Some(alias.to_string()) }
    }

    fn project(expressions: Vec<NamedExpr>, source: LogicalOperator) -> LogicalOperator {
        LogicalOperator::Project { expressions, source: Box::new(source), alias: None }
    }

    #[test]
    fn qualified_identifier_must_exist() {
        let ok = project(
            vec![NamedExpr::new(Expression::ident(Field::new("t", "a")), Some("a"))],
            data_source("t", &["a"]),
        );
        assert_eq!(validate(&ok), Ok(()));

        let missing = project(
            vec![NamedExpr::new(Expression::ident(Field::new("t", "nope")), Some("x"))],
            data_source("t", &["a"]),
        );
        assert!(matches!(validate(&missing), Err(PlanError::ColumnNotFound { .. })));
    }

    #[test]
    fn unqualified_identifier_must_match_exactly_one() {
        let join = LogicalOperator::Join {
            left: Box::new(data_source("l", &["id", "name"])),
            right: Box::new(data_source("r", &["id"])),
            condition: Expression::Constant(json!(true)),
        };

        let unique = project(
            vec![NamedExpr::new(Expression::ident(Field::unqualified("name")), Some("name"))],
            join.clone(),
        );
        assert_eq!(validate(&unique), Ok(()));

        let ambiguous = project(
            vec![NamedExpr::new(Expression::ident(Field::unqualified("id")), Some("id"))],
            join,
        );
        match validate(&ambiguous) {
            Err(PlanError::AmbiguousColumn { matches, .. }) => {
                assert_eq!(matches, vec!["l.id", "r.id"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn functions_are_checked_for_existence_and_arity() {
        let unknown = project(
            vec![NamedExpr::new(Expression::func("frobnicate", vec![]), Some("x"))],
            data_source("t", &["a"]),
        );
        assert_eq!(validate(&unknown), Err(PlanError::FunctionNotFound("frobnicate".into())));

        let wrong_arity = project(
            vec![NamedExpr::new(
                Expression::func("add", vec![Expression::Constant(json!(1))]),
                Some("x"),
            )],
            data_source("t", &["a"]),
        );
        assert_eq!(
            validate(&wrong_arity),
            Err(PlanError::FunctionArity { name: "add".into(), count: 1 })
        );
    }

    #[test]
    fn aggregates_only_inside_a_group_by_projection() {
        let in_project = project(
            vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            data_source("t", &["a"]),
        );
        assert_eq!(validate(&in_project), Err(PlanError::AggregateNotAllowed("count".into())));

        let in_group_by = LogicalOperator::GroupBy {
            expressions: vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            group_by: vec![],
            source: Box::new(data_source("t", &["a"])),
            alias: None,
        };
        assert_eq!(validate(&in_group_by), Ok(()));

        let nested = LogicalOperator::GroupBy {
            expressions: vec![NamedExpr::new(
                Expression::func("sum", vec![Expression::func("count", vec![])]),
                Some("n"),
            )],
            group_by: vec![],
            source: Box::new(data_source("t", &["a"])),
            alias: None,
        };
        assert_eq!(validate(&nested), Err(PlanError::AggregateNotAllowed("count".into())));
    }

    #[test]
    fn group_keys_may_not_aggregate() {
        let bad = LogicalOperator::GroupBy {
            expressions: vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            group_by: vec![Expression::func("count", vec![])],
            source: Box::new(data_source("t", &["a"])),
            alias: None,
        };
        assert_eq!(validate(&bad), Err(PlanError::AggregateNotAllowed("count".into())));
    }

    #[test]
    fn errors_surface_from_deep_subtrees() {
        let tree = LogicalOperator::Limit {
            limit: 1,
            source: Box::new(LogicalOperator::Sort {
                keys: vec![],
                source: Box::new(project(
                    vec![NamedExpr::new(Expression::ident(Field::new("t", "ghost")), Some("g"))],
                    data_source("t", &["a"]),
                )),
            }),
        };
        assert!(matches!(validate(&tree), Err(PlanError::ColumnNotFound { .. })));
    }
}
