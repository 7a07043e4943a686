use std::sync::Arc;

use crate::{
    functions::inspectors::Inspectors,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::ExprExecutor,
    },
    query::{Expression, Field},
};

/// Broadcast nested-loop join. The right side is materialized in full on the
/// first pull; every left row is then paired with each right row for which
/// the condition evaluates to true. The materialized side is released when
/// the left side is exhausted.
pub struct Join {
    left: Arc<dyn PhysicalOperator>,
    right: Arc<dyn PhysicalOperator>,
    condition: Expression,
    columns: Vec<Field>,
}

impl Join {
    pub fn new(
        left: Arc<dyn PhysicalOperator>,
        right: Arc<dyn PhysicalOperator>,
        condition: Expression,
    ) -> Self {
        let mut columns = left.column_aliases().to_vec();
        columns.extend_from_slice(right.column_aliases());
        Self { left, right, condition, columns }
    }
}

impl PhysicalOperator for Join {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        // The condition sees the concatenated layout, left columns first.
        let condition = ExprExecutor::compile(&self.condition, &self.columns)?;
        Ok(TupleStream::new(Box::new(JoinSource {
            condition,
            left: self.left.data(ctx)?,
            right: self.right.clone(),
            ctx: ctx.clone(),
            materialized: None,
            current_left: None,
            right_index: 0,
        })))
    }

    fn describe(&self) -> String {
        format!("Join on {}", self.condition)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}

struct JoinSource {
    condition: ExprExecutor,
    left: TupleStream,
    right: Arc<dyn PhysicalOperator>,
    ctx: ExecutionContext,
    materialized: Option<Vec<Tuple>>,
    current_left: Option<Tuple>,
    right_index: usize,
}

impl RowSource for JoinSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.materialized.is_none() {
            let rows: Vec<Tuple> = self.right.data(&self.ctx)?.collect::<Result<_, _>>()?;
            self.materialized = Some(rows);
        }
        loop {
            if self.current_left.is_none() {
                match self.left.next_tuple()? {
                    Some(tuple) => {
                        self.current_left = Some(tuple);
                        self.right_index = 0;
                    }
                    None => {
                        self.materialized = None;
                        return Ok(None);
                    }
                }
            }
            let (left_row, rows) = match (&self.current_left, &self.materialized) {
                (Some(left_row), Some(rows)) => (left_row, rows),
                _ => return Ok(None),
            };
            while self.right_index < rows.len() {
                let right_row = &rows[self.right_index];
                self.right_index += 1;
                let mut combined = left_row.clone();
                combined.extend_from_slice(right_row);
                if Inspectors::boolean(&self.condition.evaluate(&combined)) == Some(true) {
                    return Ok(Some(combined));
                }
            }
            self.current_left = None;
        }
    }

    fn close(&mut self) {
        self.left.close();
        self.materialized = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::operators::{scan::TableScan, test_support::drain};
    use crate::{
        formats::memory::MemoryFormat,
        query::{Table, TableType},
    };
    use serde_json::{Value, json};

    fn scan(path: &str, alias: &str, rows: Vec<Value>, fields: &[&str]) -> Arc<dyn PhysicalOperator> {
        let format = Arc::new(MemoryFormat::new());
        format.load(path, rows);
        let mut table = Table::new(TableType::Json, path);
        table.fields = fields.iter().map(|s| s.to_string()).collect();
        Arc::new(TableScan::new(&table, Some(alias.to_string()), format))
    }

    fn eq_condition() -> Expression {
        Expression::func("equal", vec![
            Expression::ident(Field::new("u", "id")),
            Expression::ident(Field::new("o", "user_id")),
        ])
    }

    #[test]
    fn emits_matching_pairs_in_left_order() {
        let users = scan(
            "users",
            "u",
            vec![json!({"id": 1, "name": "ada"}), json!({"id": 2, "name": "bob"})],
            &["id", "name"],
        );
        let orders = scan(
            "orders",
            "o",
            vec![
                json!({"user_id": 2, "item": "pen"}),
                json!({"user_id": 1, "item": "ink"}),
                json!({"user_id": 1, "item": "pad"}),
            ],
            &["user_id", "item"],
        );
        let join = Join::new(users, orders, eq_condition());
        assert_eq!(join.column_aliases().len(), 4);
        assert_eq!(drain(&join).unwrap(), vec![
            vec![json!(1), json!("ada"), json!(1), json!("ink")],
            vec![json!(1), json!("ada"), json!(1), json!("pad")],
            vec![json!(2), json!("bob"), json!(2), json!("pen")],
        ]);
    }

    #[test]
    fn no_matches_yields_no_rows() {
        let users = scan("users", "u", vec![json!({"id": 1})], &["id"]);
        let orders = scan("orders", "o", vec![json!({"user_id": 9})], &["user_id"]);
        let join = Join::new(users, orders, eq_condition());
        assert!(drain(&join).unwrap().is_empty());
    }

    #[test]
    fn null_condition_drops_the_pair() {
        let users = scan("users", "u", vec![json!({"id": null})], &["id"]);
        let orders = scan("orders", "o", vec![json!({"user_id": 1})], &["user_id"]);
        let join = Join::new(users, orders, eq_condition());
        assert!(drain(&join).unwrap().is_empty());
    }
}
