use std::sync::Arc;

use crate::{
    functions::inspectors::Inspectors,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::ExprExecutor,
    },
    query::{Expression, Field},
};

/// Keeps upstream rows whose predicate evaluates to true. Null and non-bool
/// results drop the row.
pub struct Filter {
    predicate: Expression,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Filter {
    pub fn new(predicate: Expression, child: Arc<dyn PhysicalOperator>) -> Self {
        let columns = child.column_aliases().to_vec();
        Self { predicate, child, columns }
    }
}

impl PhysicalOperator for Filter {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let predicate = ExprExecutor::compile(&self.predicate, self.child.column_aliases())?;
        Ok(TupleStream::new(Box::new(FilterSource {
            predicate,
            upstream: self.child.data(ctx)?,
        })))
    }

    fn describe(&self) -> String {
        format!("Filter predicate={}", self.predicate)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct FilterSource {
    predicate: ExprExecutor,
    upstream: TupleStream,
}

impl RowSource for FilterSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        while let Some(tuple) = self.upstream.next_tuple()? {
            if Inspectors::boolean(&self.predicate.evaluate(&tuple)) == Some(true) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.upstream.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::operators::{scan::TableScan, test_support::*};
    use crate::query::{Table, TableType};
    use serde_json::json;

    fn scan(rows: Vec<serde_json::Value>) -> Arc<dyn PhysicalOperator> {
        let (_, format) = mk_registry("t", rows);
        let mut table = Table::new(TableType::Json, "t");
        table.fields = vec!["a".to_string()];
        Arc::new(TableScan::new(&table, None, format))
    }

    #[test]
    fn keeps_only_true_rows() {
        let child = scan(vec![json!({"a": 1}), json!({"a": 5}), json!({"a": null})]);
        let filter = Filter::new(
            Expression::func("gt", vec![
                Expression::ident(Field::unqualified("a")),
                Expression::Constant(json!(2)),
            ]),
            child,
        );
        // a=null makes gt null, which drops the row.
        assert_eq!(drain(&filter).unwrap(), vec![vec![json!(5)]]);
    }

    #[test]
    fn constant_false_yields_nothing() {
        let child = scan(vec![json!({"a": 1})]);
        let filter = Filter::new(Expression::Constant(json!(false)), child);
        assert!(drain(&filter).unwrap().is_empty());
    }
}
