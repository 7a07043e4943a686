use std::sync::Arc;

use serde_json::Value;

use crate::{
    formats::{TableFormat, TableReader},
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::{Field, Table, WILDCARD_FIELD},
};

/// Leaf operator reading records through a [`TableFormat`]. Each record is
/// mapped onto the fixed column order decided by field pushdown; the wildcard
/// column receives the whole record as an object.
pub struct TableScan {
    path: String,
    field_names: Vec<String>,
    columns: Vec<Field>,
    format: Arc<dyn TableFormat>,
}

impl TableScan {
    pub fn new(table: &Table, alias: Option<String>, format: Arc<dyn TableFormat>) -> Self {
        let columns = table
            .fields
            .iter()
            .map(|name| Field { table_alias: alias.clone(), field_name: name.clone() })
            .collect();
        Self { path: table.path.clone(), field_names: table.fields.clone(), columns, format }
    }
}

impl PhysicalOperator for TableScan {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        Ok(TupleStream::new(Box::new(ScanSource {
            path: ctx.resolve(&self.path).to_string(),
            field_names: self.field_names.clone(),
            format: self.format.clone(),
            reader: None,
        })))
    }

    fn describe(&self) -> String {
        format!("TableScan path={} columns=[{}]", self.path, self.field_names.join(", "))
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![]
    }
}

struct ScanSource {
    path: String,
    field_names: Vec<String>,
    format: Arc<dyn TableFormat>,
    reader: Option<Box<dyn TableReader>>,
}

impl RowSource for ScanSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.reader.is_none() {
            self.reader = Some(self.format.reader(&self.path)?);
        }
        let Some(reader) = self.reader.as_mut() else { return Ok(None) };
        let Some(record) = reader.next_record()? else { return Ok(None) };
        let tuple = self
            .field_names
            .iter()
            .map(|name| {
                if name == WILDCARD_FIELD {
                    Value::Object(record.clone())
                } else {
                    record.get(name).cloned().unwrap_or(Value::Null)
                }
            })
            .collect();
        Ok(Some(tuple))
    }

    fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
    }
}
