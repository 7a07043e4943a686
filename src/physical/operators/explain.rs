use std::sync::Arc;

use serde_json::Value;

use crate::{
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::Field,
};

/// Renders the physical tree, one row per line. Never pulls from the child.
pub struct Explain {
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Explain {
    pub fn new(child: Arc<dyn PhysicalOperator>) -> Self {
        Self { child, columns: vec![Field::unqualified("plan")] }
    }

    fn render(op: &dyn PhysicalOperator, depth: usize, lines: &mut Vec<String>) {
        lines.push(format!("{}{}", "  ".repeat(depth), op.describe()));
        for child in op.children() {
            Self::render(child, depth + 1, lines);
        }
    }
}

impl PhysicalOperator for Explain {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, _ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let mut lines = Vec::new();
        Self::render(self.child.as_ref(), 0, &mut lines);
        Ok(TupleStream::new(Box::new(ExplainSource {
            lines: lines.into_iter(),
        })))
    }

    fn describe(&self) -> String {
        "Explain".to_string()
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct ExplainSource {
    lines: std::vec::IntoIter<String>,
}

impl RowSource for ExplainSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        Ok(self.lines.next().map(|line| vec![Value::String(line)]))
    }

    fn close(&mut self) {}
}
