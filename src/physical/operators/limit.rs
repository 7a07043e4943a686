use std::sync::Arc;

use crate::{
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::Field,
};

/// Passes through at most N rows, then closes its upstream proactively so
/// open readers are released as soon as the limit is hit.
pub struct Limit {
    limit: usize,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Limit {
    pub fn new(limit: usize, child: Arc<dyn PhysicalOperator>) -> Self {
        let columns = child.column_aliases().to_vec();
        Self { limit, child, columns }
    }
}

impl PhysicalOperator for Limit {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        Ok(TupleStream::new(Box::new(LimitSource {
            remaining: self.limit,
            upstream: self.child.data(ctx)?,
        })))
    }

    fn describe(&self) -> String {
        format!("Limit {}", self.limit)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct LimitSource {
    remaining: usize,
    upstream: TupleStream,
}

impl RowSource for LimitSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.remaining == 0 {
            self.upstream.close();
            return Ok(None);
        }
        match self.upstream.next_tuple()? {
            Some(tuple) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.upstream.close();
                }
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.upstream.close();
    }
}
