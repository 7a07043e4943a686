use crate::query::{Expression, Field, NamedExpr, OrderExpr, Table};

pub mod builder;
pub mod fold;
pub mod parallelize;
pub mod plan_error;
pub mod populate_fields;
pub mod validate;
pub mod visitor;

pub use plan_error::PlanError;

/// One node of the logical plan. Each rewrite pass consumes and rebuilds a
/// whole tree; nodes are never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    Project {
        expressions: Vec<NamedExpr>,
        source: Box<LogicalOperator>,
        /// Inline-view alias. Output fields are qualified with it when set.
        alias: Option<String>,
    },
    LateralView {
        expression: NamedExpr,
        source: Box<LogicalOperator>,
    },
    Filter {
        predicate: Expression,
        source: Box<LogicalOperator>,
    },
    Sort {
        keys: Vec<OrderExpr>,
        source: Box<LogicalOperator>,
    },
    Limit {
        limit: usize,
        source: Box<LogicalOperator>,
    },
    Describe {
        table: Table,
        /// Render a DDL string instead of one row per column.
        table_output: bool,
    },
    DataSource {
        table: Table,
        alias: Option<String>,
    },
    Explain {
        source: Box<LogicalOperator>,
    },
    GroupBy {
        expressions: Vec<NamedExpr>,
        group_by: Vec<Expression>,
        source: Box<LogicalOperator>,
        alias: Option<String>,
    },
    Join {
        left: Box<LogicalOperator>,
        right: Box<LogicalOperator>,
        condition: Expression,
    },
    Gather {
        source: Box<LogicalOperator>,
    },
    Write {
        table: Table,
        source: Box<LogicalOperator>,
    },
}

impl LogicalOperator {
    /// The output columns of this operator, derived from the subtree alone.
    pub fn fields(&self) -> Vec<Field> {
        match self {
            LogicalOperator::Project { expressions, alias, .. }
            | LogicalOperator::GroupBy { expressions, alias, .. } => expressions
                .iter()
                .map(|named| Field {
                    table_alias: alias.clone(),
                    field_name: output_name(named),
                })
                .collect(),
            LogicalOperator::LateralView { expression, source } => {
                let name = output_name(expression);
                let mut fields = source.fields();
                if !fields.iter().any(|f| f.field_name == name) {
                    fields.push(Field::unqualified(&name));
                }
                fields
            }
            LogicalOperator::Filter { source, .. }
            | LogicalOperator::Sort { source, .. }
            | LogicalOperator::Limit { source, .. }
            | LogicalOperator::Gather { source } => source.fields(),
            LogicalOperator::Describe { table_output, .. } => {
                if *table_output {
                    vec![Field::unqualified("table")]
                } else {
                    vec![Field::unqualified("column_name"), Field::unqualified("column_type")]
                }
            }
            LogicalOperator::DataSource { table, alias } => table
                .fields
                .iter()
                .map(|name| Field { table_alias: alias.clone(), field_name: name.clone() })
                .collect(),
            LogicalOperator::Explain { .. } => vec![Field::unqualified("plan")],
            LogicalOperator::Join { left, right, .. } => {
                let mut fields = left.fields();
                fields.extend(right.fields());
                fields
            }
            LogicalOperator::Write { .. } => vec![Field::unqualified("result")],
        }
    }

    pub fn children(&self) -> Vec<&LogicalOperator> {
        match self {
            LogicalOperator::Project { source, .. }
            | LogicalOperator::LateralView { source, .. }
            | LogicalOperator::Filter { source, .. }
            | LogicalOperator::Sort { source, .. }
            | LogicalOperator::Limit { source, .. }
            | LogicalOperator::Explain { source }
            | LogicalOperator::GroupBy { source, .. }
            | LogicalOperator::Gather { source }
            | LogicalOperator::Write { source, .. } => vec![source],
            LogicalOperator::Join { left, right, .. } => vec![left, right],
            LogicalOperator::Describe { .. } | LogicalOperator::DataSource { .. } => vec![],
        }
    }
}

/// The output column name of a projected expression. After field pushdown
/// every projection carries an alias; the rendered expression is only the
/// fallback for trees inspected before that pass.
pub fn output_name(named: &NamedExpr) -> String {
    named.alias.clone().unwrap_or_else(|| named.expression.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TableType;

    fn source(alias: Option<&str>, fields: &[&str]) -> LogicalOperator {
        let mut table = Table::new(TableType::Json, "t");
        table.fields = fields.iter().map(|s| s.to_string()).collect();
        LogicalOperator::DataSource { table, alias: alias.map(|a| a.to_string()) }
    }

    #[test]
    fn data_source_fields_carry_the_alias() {
        let op = source(Some("t"), &["a", "b"]);
        assert_eq!(op.fields(), vec![Field::new("t", "a"), Field::new("t", "b")]);

        let bare = source(None, &["a"]);
        assert_eq!(bare.fields(), vec![Field::unqualified("a")]);
    }

    #[test]
    fn project_fields_use_aliases_and_view_qualification() {
        let project = LogicalOperator::Project {
            expressions: vec![NamedExpr::new(
                Expression::ident(Field::new("t", "a")),
                Some("total"),
            )],
            source: Box::new(source(Some("t"), &["a"])),
            alias: Some("v".into()),
        };
        assert_eq!(project.fields(), vec![Field::new("v", "total")]);
    }

    #[test]
    fn lateral_view_appends_unless_shadowing() {
        let appended = LogicalOperator::LateralView {
            expression: NamedExpr::new(Expression::ident(Field::unqualified("tags")), Some("tag")),
            source: Box::new(source(None, &["id", "tags"])),
        };
        assert_eq!(
            appended.fields(),
            vec![
                Field::unqualified("id"),
                Field::unqualified("tags"),
                Field::unqualified("tag")
            ]
        );

        let shadowed = LogicalOperator::LateralView {
            expression: NamedExpr::new(Expression::ident(Field::unqualified("tags")), Some("id")),
            source: Box::new(source(None, &["id", "tags"])),
        };
        assert_eq!(
            shadowed.fields(),
            vec![Field::unqualified("id"), Field::unqualified("tags")]
        );
    }

    #[test]
    fn join_concatenates_children_fields() {
        let join = LogicalOperator::Join {
            left: Box::new(source(Some("l"), &["a"])),
            right: Box::new(source(Some("r"), &["b"])),
            condition: Expression::Constant(serde_json::json!(true)),
        };
        assert_eq!(join.fields(), vec![Field::new("l", "a"), Field::new("r", "b")]);
    }
}
