use std::collections::BTreeSet;

use indexmap::IndexSet;

use crate::{
    logical::LogicalOperator,
    query::{Expression, Field, NamedExpr, OrderExpr},
};

/// Field pushdown. Walks the tree with the set of fields demanded by
/// everything downstream, back-filling missing projection aliases with
/// `_col<N>` along the way, and finally writes each DataSource's required
/// field list, filtered to the fields it owns: unqualified ones and those
/// qualified with its own alias.
///
/// Projecting operators reset the demand, since their output satisfies all
/// downstream references; only the identifiers inside their own expressions
/// matter below them.
pub fn populate_fields(op: LogicalOperator) -> LogicalOperator {
    populate(op, &BTreeSet::new())
}

fn populate(op: LogicalOperator, demand: &BTreeSet<Field>) -> LogicalOperator {
    match op {
        LogicalOperator::Project { expressions, source, alias } => {
            let expressions = backfill_aliases(expressions);
            let mut child_demand = BTreeSet::new();
            for named in &expressions {
                collect_fields(&named.expression, &mut child_demand);
            }
            LogicalOperator::Project {
                expressions,
                source: Box::new(populate(*source, &child_demand)),
                alias,
            }
        }
        LogicalOperator::GroupBy { expressions, group_by, source, alias } => {
            let expressions = backfill_aliases(expressions);
            let mut child_demand = BTreeSet::new();
            for named in &expressions {
                collect_fields(&named.expression, &mut child_demand);
            }
            for key in &group_by {
                collect_fields(key, &mut child_demand);
            }
            LogicalOperator::GroupBy {
                expressions,
                group_by,
                source: Box::new(populate(*source, &child_demand)),
                alias,
            }
        }
        LogicalOperator::Filter { predicate, source } => {
            let mut child_demand = demand.clone();
            collect_fields(&predicate, &mut child_demand);
            LogicalOperator::Filter { predicate, source: Box::new(populate(*source, &child_demand)) }
        }
        LogicalOperator::Sort { keys, source } => {
            let mut child_demand = demand.clone();
            for OrderExpr { expression, .. } in &keys {
                collect_fields(expression, &mut child_demand);
            }
            LogicalOperator::Sort { keys, source: Box::new(populate(*source, &child_demand)) }
        }
        LogicalOperator::Limit { limit, source } => {
            LogicalOperator::Limit { limit, source: Box::new(populate(*source, demand)) }
        }
        LogicalOperator::LateralView { expression, source } => {
            // The lateral column is produced here, not upstream. Unless the
            // lateral expression itself reads a column of the same name
            // (shadowing), the demand for it must not reach the source.
            let name = crate::logical::output_name(&expression);
            let mut child_demand: BTreeSet<Field> =
                demand.iter().filter(|f| f.field_name != name).cloned().collect();
            collect_fields(&expression.expression, &mut child_demand);
            LogicalOperator::LateralView {
                expression,
                source: Box::new(populate(*source, &child_demand)),
            }
        }
        LogicalOperator::Join { left, right, condition } => {
            let mut child_demand = demand.clone();
            collect_fields(&condition, &mut child_demand);
            LogicalOperator::Join {
                left: Box::new(populate(*left, &child_demand)),
                right: Box::new(populate(*right, &child_demand)),
                condition,
            }
        }
        LogicalOperator::Gather { source } => {
            LogicalOperator::Gather { source: Box::new(populate(*source, demand)) }
        }
        LogicalOperator::Explain { source } => {
            LogicalOperator::Explain { source: Box::new(populate(*source, &BTreeSet::new())) }
        }
        LogicalOperator::Write { table, source } => {
            LogicalOperator::Write { table, source: Box::new(populate(*source, &BTreeSet::new())) }
        }
        LogicalOperator::DataSource { mut table, alias } => {
            // Dedup by name: the same column may be demanded both bare and
            // qualified, and it must land in the source list once.
            let names: IndexSet<String> = demand
                .iter()
                .filter(|field| match (&field.table_alias, &alias) {
                    (None, _) => true,
                    (Some(owner), Some(alias)) => owner == alias,
                    (Some(_), None) => false,
                })
                .map(|field| field.field_name.clone())
                .collect();
            table.fields = names.into_iter().collect();
            LogicalOperator::DataSource { table, alias }
        }
        leaf @ LogicalOperator::Describe { .. } => leaf,
    }
}

fn backfill_aliases(expressions: Vec<NamedExpr>) -> Vec<NamedExpr> {
    expressions
        .into_iter()
        .enumerate()
        .map(|(index, named)| match named.alias {
            Some(_) => named,
            None => {
                let alias = match &named.expression {
                    // A bare column keeps its own name as the output alias.
                    Expression::Identifier(field) => field.field_name.clone(),
                    _ => format!("_col{index}"),
                };
                NamedExpr { alias: Some(alias), ..named }
            }
        })
        .collect()
}

fn collect_fields(expression: &Expression, out: &mut BTreeSet<Field>) {
    match expression {
        Expression::Identifier(field) => {
            out.insert(field.clone());
        }
        Expression::Function { parameters, .. } => {
            for parameter in parameters {
                collect_fields(parameter, out);
            }
        }
        Expression::Constant(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Table, TableType};
    use serde_json::json;

    fn data_source(alias: Option<&str>) -> LogicalOperator {
        LogicalOperator::DataSource {
            table: Table::new(TableType::Json, "t"),
            alias: alias.map(|a| a.to_string()),
        }
    }

    fn source_fields(op: &LogicalOperator) -> Vec<String> {
        match op {
            LogicalOperator::DataSource { table, .. } => table.fields.clone(),
            other => other
                .children()
                .first()
                .map(|child| source_fields(child))
                .unwrap_or_default(),
        }
    }

    #[test]
    fn project_demand_reaches_the_data_source() {
        let tree = LogicalOperator::Project {
            expressions: vec![
                NamedExpr::new(Expression::ident(Field::new("t", "b")), None),
                NamedExpr::new(
                    Expression::func("add", vec![
                        Expression::ident(Field::new("t", "a")),
                        Expression::Constant(json!(1)),
                    ]),
                    Some("sum"),
                ),
            ],
            source: Box::new(data_source(Some("t"))),
            alias: None,
        };
        let out = populate_fields(tree);
        assert_eq!(source_fields(&out), vec!["a", "b"]);
    }

    #[test]
    fn missing_aliases_are_backfilled() {
        let tree = LogicalOperator::Project {
            expressions: vec![
                NamedExpr::new(Expression::Constant(json!(1)), None),
                NamedExpr::new(Expression::ident(Field::new("t", "a")), None),
                NamedExpr::new(Expression::Constant(json!(2)), Some("two")),
            ],
            source: Box::new(data_source(Some("t"))),
            alias: None,
        };
        let LogicalOperator::Project { expressions, .. } = populate_fields(tree) else {
            panic!("expected project");
        };
        let aliases: Vec<_> = expressions.iter().map(|e| e.alias.clone().unwrap()).collect();
        assert_eq!(aliases, vec!["_col0", "a", "two"]);
    }

    #[test]
    fn mixed_qualification_lands_in_the_source_once() {
        // `select a, b from t where t.a > 1` demands "a" both bare and as
        // "t.a"; the source list must carry it a single time.
        let tree = LogicalOperator::Project {
            expressions: vec![
                NamedExpr::new(Expression::ident(Field::unqualified("a")), None),
                NamedExpr::new(Expression::ident(Field::unqualified("b")), None),
            ],
            source: Box::new(LogicalOperator::Filter {
                predicate: Expression::func("gt", vec![
                    Expression::ident(Field::new("t", "a")),
                    Expression::Constant(json!(1)),
                ]),
                source: Box::new(data_source(Some("t"))),
            }),
            alias: None,
        };
        let out = populate_fields(tree);
        assert_eq!(source_fields(&out), vec!["a", "b"]);
    }

    #[test]
    fn predicate_fields_are_demanded_but_not_projected() {
        let tree = LogicalOperator::Project {
            expressions: vec![NamedExpr::new(Expression::ident(Field::new("t", "a")), None)],
            source: Box::new(LogicalOperator::Filter {
                predicate: Expression::func("is_not_null", vec![Expression::ident(Field::new(
                    "t", "b",
                ))]),
                source: Box::new(data_source(Some("t"))),
            }),
            alias: None,
        };
        let out = populate_fields(tree);
        assert_eq!(source_fields(&out), vec!["a", "b"]);
    }

    #[test]
    fn join_demand_splits_by_alias_ownership() {
        let tree = LogicalOperator::Project {
            expressions: vec![
                NamedExpr::new(Expression::ident(Field::new("l", "name")), None),
                NamedExpr::new(Expression::ident(Field::new("r", "total")), None),
            ],
            source: Box::new(LogicalOperator::Join {
                left: Box::new(data_source(Some("l"))),
                right: Box::new(data_source(Some("r"))),
                condition: Expression::func("equal", vec![
                    Expression::ident(Field::new("l", "id")),
                    Expression::ident(Field::new("r", "owner")),
                ]),
            }),
            alias: None,
        };
        let out = populate_fields(tree);
        let LogicalOperator::Project { source, .. } = out else { panic!("expected project") };
        let LogicalOperator::Join { left, right, .. } = *source else { panic!("expected join") };
        assert_eq!(source_fields(&left), vec!["id", "name"]);
        assert_eq!(source_fields(&right), vec!["owner", "total"]);
    }

    #[test]
    fn lateral_alias_is_not_pushed_past_the_view() {
        let tree = LogicalOperator::Project {
            expressions: vec![
                NamedExpr::new(Expression::ident(Field::unqualified("id")), None),
                NamedExpr::new(Expression::ident(Field::unqualified("tag")), None),
            ],
            source: Box::new(LogicalOperator::LateralView {
                expression: NamedExpr::new(
                    Expression::ident(Field::unqualified("tags")),
                    Some("tag"),
                ),
                source: Box::new(data_source(None)),
            }),
            alias: None,
        };
        let out = populate_fields(tree);
        // "tag" is produced by the lateral view; only id and tags reach the
        // source.
        assert_eq!(source_fields(&out), vec!["id", "tags"]);
    }

    #[test]
    fn wildcard_is_demanded_like_any_other_field() {
        let tree = LogicalOperator::Project {
            expressions: vec![NamedExpr::new(
                Expression::ident(Field::unqualified(crate::query::WILDCARD_FIELD)),
                None,
            )],
            source: Box::new(data_source(Some("t"))),
            alias: None,
        };
        let out = populate_fields(tree);
        assert_eq!(source_fields(&out), vec![crate::query::WILDCARD_FIELD]);
    }
}
