use std::{collections::VecDeque, sync::Arc};

use crate::{
    functions::inspectors::Inspectors,
    logical::output_name,
    physical::{
        ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream,
        expressions::ExprExecutor,
    },
    query::{Field, NamedExpr},
};

/// Array flattening. For each upstream row the lateral expression is
/// evaluated; every element of the resulting array yields one output row.
/// When the lateral alias names an existing upstream column the element
/// replaces that column in place ("shadowing"), otherwise it is appended as
/// a new unqualified column. Rows whose expression is not an array produce
/// nothing.
pub struct LateralView {
    expression: NamedExpr,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
    /// Position of the shadowed column, or None when the element column is
    /// appended.
    shadow: Option<usize>,
}

impl LateralView {
    pub fn new(expression: NamedExpr, child: Arc<dyn PhysicalOperator>) -> Self {
        let name = output_name(&expression);
        let mut columns = child.column_aliases().to_vec();
        let shadow = columns.iter().position(|field| field.field_name == name);
        if shadow.is_none() {
            columns.push(Field::unqualified(&name));
        }
        Self { expression, child, columns, shadow }
    }
}

impl PhysicalOperator for LateralView {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        let executor =
            ExprExecutor::compile(&self.expression.expression, self.child.column_aliases())?;
        Ok(TupleStream::new(Box::new(LateralSource {
            executor,
            shadow: self.shadow,
            upstream: self.child.data(ctx)?,
            pending: VecDeque::new(),
        })))
    }

    fn describe(&self) -> String {
        format!("LateralView {}", self.expression)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct LateralSource {
    executor: ExprExecutor,
    shadow: Option<usize>,
    upstream: TupleStream,
    pending: VecDeque<Tuple>,
}

impl RowSource for LateralSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Ok(Some(tuple));
            }
            let Some(tuple) = self.upstream.next_tuple()? else { return Ok(None) };
            let value = self.executor.evaluate(&tuple);
            let Some(elements) = Inspectors::array(&value) else { continue };
            for element in elements {
                let mut row = tuple.clone();
                match self.shadow {
                    Some(index) => row[index] = element.clone(),
                    None => row.push(element.clone()),
                }
                self.pending.push_back(row);
            }
        }
    }

    fn close(&mut self) {
        self.upstream.close();
        self.pending.clear();
    }
}
