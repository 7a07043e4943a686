use std::sync::Arc;

use serde_json::Value;

use crate::{
    functions::inspectors::Inspectors,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::ExprExecutor,
    },
    query::{Field, OrderExpr},
};

/// Stable multi-key sort. Buffers the whole upstream on the first pull, then
/// streams the ordered rows out; the buffer is released once exhausted. For
/// an ascending key nulls come first, since the comparator ranks null lowest.
pub struct Sort {
    keys: Vec<OrderExpr>,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Sort {
    pub fn new(keys: Vec<OrderExpr>, child: Arc<dyn PhysicalOperator>) -> Self {
        let columns = child.column_aliases().to_vec();
        Self { keys, child, columns }
    }
}

impl PhysicalOperator for Sort {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let layout = self.child.column_aliases();
        let executors = self
            .keys
            .iter()
            .map(|key| {
                Ok((ExprExecutor::compile(&key.expression, layout)?, key.ascending))
            })
            .collect::<Result<Vec<_>, ExecError>>()?;
        Ok(TupleStream::new(Box::new(SortSource {
            executors,
            upstream: Some(self.child.data(ctx)?),
            sorted: None,
        })))
    }

    fn describe(&self) -> String {
        let rendered: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        format!("Sort [{}]", rendered.join(", "))
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct SortSource {
    executors: Vec<(ExprExecutor, bool)>,
    upstream: Option<TupleStream>,
    sorted: Option<std::vec::IntoIter<Tuple>>,
}

impl RowSource for SortSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.sorted.is_none() {
            let Some(upstream) = self.upstream.take() else { return Ok(None) };
            let mut keyed: Vec<(Vec<Value>, Tuple)> = Vec::new();
            for tuple in upstream {
                let tuple = tuple?;
                let keys = self.executors.iter().map(|(e, _)| e.evaluate(&tuple)).collect();
                keyed.push((keys, tuple));
            }
            let directions: Vec<bool> = self.executors.iter().map(|(_, asc)| *asc).collect();
            keyed.sort_by(|(a, _), (b, _)| {
                for (index, ascending) in directions.iter().enumerate() {
                    let ord = Inspectors::compare_for_sort(&a[index], &b[index]);
                    let ord = if *ascending { ord } else { ord.reverse() };
                    if !ord.is_eq() {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
            self.sorted = Some(keyed.into_iter().map(|(_, t)| t).collect::<Vec<_>>().into_iter());
        }
        let next = self.sorted.as_mut().and_then(|rows| rows.next());
        if next.is_none() {
            self.sorted = None;
        }
        Ok(next)
    }

    fn close(&mut self) {
        if let Some(mut upstream) = self.upstream.take() {
            upstream.close();
        }
        self.sorted = None;
    }
}
