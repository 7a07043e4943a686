use std::sync::Arc;

use crate::{
    logical::output_name,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::ExprExecutor,
    },
    query::{Field, NamedExpr},
};

/// Evaluates one scalar expression per output column, 1:1 with upstream rows.
pub struct Project {
    expressions: Vec<NamedExpr>,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Project {
    pub fn new(
        expressions: Vec<NamedExpr>,
        alias: Option<String>,
        child: Arc<dyn PhysicalOperator>,
    ) -> Self {
        let columns = expressions
            .iter()
            .map(|named| Field { table_alias: alias.clone(), field_name: output_name(named) })
            .collect();
        Self { expressions, child, columns }
    }
}

impl PhysicalOperator for Project {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let layout = self.child.column_aliases();
        let executors = self
            .expressions
            .iter()
            .map(|named| ExprExecutor::compile(&named.expression, layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TupleStream::new(Box::new(ProjectSource { executors, upstream: self.child.data(ctx)? })))
    }

    fn describe(&self) -> String {
        let rendered: Vec<String> = self.expressions.iter().map(|e| e.to_string()).collect();
        format!("Project [{}]", rendered.join(", "))
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct ProjectSource {
    executors: Vec<ExprExecutor>,
    upstream: TupleStream,
}

impl RowSource for ProjectSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        match self.upstream.next_tuple()? {
            Some(tuple) => {
                Ok(Some(self.executors.iter().map(|e| e.evaluate(&tuple)).collect()))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.upstream.close();
    }
}
