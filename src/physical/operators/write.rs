use std::sync::Arc;

use serde_json::Value;

use crate::{
    formats::{Record, TableFormat},
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::{Field, Table},
};

/// Drains the child into a format writer and reports the row count.
pub struct Write {
    table: Table,
    format: Arc<dyn TableFormat>,
    child: Arc<dyn PhysicalOperator>,
    columns: Vec<Field>,
}

impl Write {
    pub fn new(table: Table, format: Arc<dyn TableFormat>, child: Arc<dyn PhysicalOperator>) -> Self {
        Self { table, format, child, columns: vec![Field::unqualified("result")] }
    }
}

impl PhysicalOperator for Write {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        Ok(TupleStream::new(Box::new(WriteSource {
            path: ctx.resolve(&self.table.path).to_string(),
            format: self.format.clone(),
            child: self.child.clone(),
            ctx: ctx.clone(),
            done: false,
        })))
    }

    fn describe(&self) -> String {
        format!("Write path={}", self.table.path)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![self.child.as_ref()]
    }
}

struct WriteSource {
    path: String,
    format: Arc<dyn TableFormat>,
    child: Arc<dyn PhysicalOperator>,
    ctx: ExecutionContext,
    done: bool,
}

impl WriteSource {
    fn run(&mut self) -> Result<Tuple, ExecError> {
        let names: Vec<String> =
            self.child.column_aliases().iter().map(|field| field.field_name.clone()).collect();
        let mut writer = self.format.writer(&self.path, &names)?;
        let mut count = 0usize;
        for row in self.child.data(&self.ctx)? {
            let row = row?;
            let mut record = Record::new();
            for (name, value) in names.iter().zip(row) {
                record.insert(name.clone(), value);
            }
            writer.write(&record)?;
            count += 1;
        }
        writer.close()?;
        Ok(vec![Value::String(format!("{count} rows written to \"{}\"", self.path))])
    }
}

impl RowSource for WriteSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        self.run().map(Some)
    }

    fn close(&mut self) {
        self.done = true;
    }
}
