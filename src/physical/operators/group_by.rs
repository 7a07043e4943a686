use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    config::EngineConfig,
    functions::inspectors::Inspectors,
    logical::output_name,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::{AggExecutor, ExprExecutor},
    },
    query::{Expression, Field, NamedExpr},
};

/// Hash aggregation. Groups upstream rows by the canonical form of the
/// evaluated key tuple, feeds each group a fresh set of aggregate executors,
/// and emits one row per group in first-seen order. With no keys and zero
/// input rows it still emits exactly one row, so `count()` over an empty
/// input yields 0 rather than nothing.
pub struct GroupBy {
    expressions: Vec<NamedExpr>,
    group_by: Vec<Expression>,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
    config: EngineConfig,
}

impl GroupBy {
    pub fn new(
        expressions: Vec<NamedExpr>,
        group_by: Vec<Expression>,
        alias: Option<String>,
        child: Arc<dyn PhysicalOperator>,
        config: EngineConfig,
    ) -> Self {
        let columns = expressions
            .iter()
            .map(|named| Field { table_alias: alias.clone(), field_name: output_name(named) })
            .collect();
        Self { expressions, group_by, child, columns, config }
    }
}

impl PhysicalOperator for GroupBy {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let layout = self.child.column_aliases().to_vec();
        Ok(TupleStream::new(Box::new(GroupBySource {
            expressions: self.expressions.clone(),
            group_by: self.group_by.clone(),
            layout,
            config: self.config.clone(),
            upstream: Some(self.child.data(ctx)?),
            output: None,
        })))
    }

    fn describe(&self) -> String {
        let exprs: Vec<String> = self.expressions.iter().map(|e| e.to_string()).collect();
        let keys: Vec<String> = self.group_by.iter().map(|k| k.to_string()).collect();
        format!("GroupBy [{}] keys=[{}]", exprs.join(", "), keys.join(", "))
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct GroupBySource {
    expressions: Vec<NamedExpr>,
    group_by: Vec<Expression>,
    layout: Vec<Field>,
    config: EngineConfig,
    upstream: Option<TupleStream>,
    output: Option<std::vec::IntoIter<Tuple>>,
}

impl GroupBySource {
    fn compile_group(&self) -> Result<Vec<AggExecutor>, ExecError> {
        self.expressions
            .iter()
            .map(|named| AggExecutor::compile(&named.expression, &self.layout, &self.config))
            .collect()
    }

    fn aggregate(&mut self) -> Result<Vec<Tuple>, ExecError> {
        let Some(upstream) = self.upstream.take() else { return Ok(vec![]) };
        let key_executors = ExprExecutor::compile_all(&self.group_by, &self.layout)?;

        let mut groups: IndexMap<String, Vec<AggExecutor>> = IndexMap::new();
        for tuple in upstream {
            let tuple = tuple?;
            let keys: Vec<Value> = key_executors.iter().map(|e| e.evaluate(&tuple)).collect();
            let key = Inspectors::canonical(&keys);
            if !groups.contains_key(&key) {
                groups.insert(key.clone(), self.compile_group()?);
            }
            if let Some(executors) = groups.get_mut(&key) {
                for executor in executors {
                    executor.process_row(&tuple);
                }
            }
        }

        if groups.is_empty() && self.group_by.is_empty() {
            // Aggregates over an empty input still produce one row.
            let executors = self.compile_group()?;
            return Ok(vec![executors.iter().map(AggExecutor::result).collect()]);
        }

        Ok(groups
            .values()
            .map(|executors| executors.iter().map(AggExecutor::result).collect())
            .collect())
    }
}

impl RowSource for GroupBySource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.output.is_none() {
            self.output = Some(self.aggregate()?.into_iter());
        }
        Ok(self.output.as_mut().and_then(|rows| rows.next()))
    }

    fn close(&mut self) {
        if let Some(mut upstream) = self.upstream.take() {
            upstream.close();
        }
        self.output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::operators::{scan::TableScan, test_support::*};
    use crate::query::{Table, TableType};
    use serde_json::json;

    fn scan(rows: Vec<Value>, fields: &[&str]) -> Arc<dyn PhysicalOperator> {
        let (_, format) = mk_registry("t", rows);
        let mut table = Table::new(TableType::Json, "t");
        table.fields = fields.iter().map(|s| s.to_string()).collect();
        Arc::new(TableScan::new(&table, None, format))
    }

    fn group_by(
        expressions: Vec<NamedExpr>,
        keys: Vec<Expression>,
        child: Arc<dyn PhysicalOperator>,
    ) -> GroupBy {
        GroupBy::new(expressions, keys, None, child, EngineConfig::default())
    }

    #[test]
    fn groups_emit_in_first_seen_order() {
        let child = scan(
            vec![
                json!({"k": "b", "v": 1}),
                json!({"k": "a", "v": 2}),
                json!({"k": "b", "v": 3}),
            ],
            &["k", "v"],
        );
        let op = group_by(
            vec![
                NamedExpr::new(Expression::ident(Field::unqualified("k")), Some("k")),
                NamedExpr::new(
                    Expression::func("sum", vec![Expression::ident(Field::unqualified("v"))]),
                    Some("total"),
                ),
            ],
            vec![Expression::ident(Field::unqualified("k"))],
            child,
        );
        assert_eq!(drain(&op).unwrap(), vec![
            vec![json!("b"), json!(4)],
            vec![json!("a"), json!(2)],
        ]);
    }

    #[test]
    fn empty_input_with_no_keys_yields_one_row() {
        let op = group_by(
            vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            vec![],
            scan(vec![], &["k"]),
        );
        assert_eq!(drain(&op).unwrap(), vec![vec![json!(0)]]);
    }

    #[test]
    fn empty_input_with_keys_yields_no_rows() {
        let op = group_by(
            vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            vec![Expression::ident(Field::unqualified("k"))],
            scan(vec![], &["k"]),
        );
        assert!(drain(&op).unwrap().is_empty());
    }

    #[test]
    fn keys_group_by_structural_equality() {
        let child = scan(
            vec![
                json!({"k": [1, 2], "v": 1}),
                json!({"k": [1, 2], "v": 2}),
                json!({"k": [2, 1], "v": 3}),
            ],
            &["k", "v"],
        );
        let op = group_by(
            vec![NamedExpr::new(Expression::func("count", vec![]), Some("n"))],
            vec![Expression::ident(Field::unqualified("k"))],
            child,
        );
        assert_eq!(drain(&op).unwrap(), vec![vec![json!(2)], vec![json!(1)]]);
    }

    #[test]
    fn scalar_over_aggregate_combines_group_results() {
        let child = scan(
            vec![json!({"v": 2}), json!({"v": 4}), json!({"v": 6})],
            &["v"],
        );
        // divide(sum(v), count()) = average
        let op = group_by(
            vec![NamedExpr::new(
                Expression::func("divide", vec![
                    Expression::func("sum", vec![Expression::ident(Field::unqualified("v"))]),
                    Expression::func("count", vec![]),
                ]),
                Some("avg"),
            )],
            vec![],
            child,
        );
        assert_eq!(drain(&op).unwrap(), vec![vec![json!(4)]]);
    }
}
