use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    formats::TableFormat,
    physical::{ExecError, ExecutionContext, PhysicalOperator, RowSource, Tuple, TupleStream},
    query::{Field, Table},
};

/// Schema inference by sampling. Reads up to `sample_size` raw records,
/// merges per-key type usage recursively through arrays and structs, and
/// renders either one row per top-level column or a single DDL string.
pub struct Describe {
    table: Table,
    table_output: bool,
    format: Arc<dyn TableFormat>,
    sample_size: usize,
    columns: Vec<Field>,
}

impl Describe {
    pub fn new(
        table: Table,
        table_output: bool,
        format: Arc<dyn TableFormat>,
        sample_size: usize,
    ) -> Self {
        let columns = if table_output {
            vec![Field::unqualified("table")]
        } else {
            vec![Field::unqualified("column_name"), Field::unqualified("column_type")]
        };
        Self { table, table_output, format, sample_size, columns }
    }
}

impl PhysicalOperator for Describe {
    fn column_aliases(&self) -> &[Field] {
        &self.columns
    }

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        Ok(TupleStream::new(Box::new(DescribeSource {
            path: ctx.resolve(&self.table.path).to_string(),
            table_output: self.table_output,
            format: self.format.clone(),
            sample_size: self.sample_size,
            output: None,
        })))
    }

    fn describe(&self) -> String {
        format!("Describe path={} sample={}", self.table.path, self.sample_size)
    }

    fn children(&self) -> Vec<&dyn PhysicalOperator> {
        vec![]
    }
}

struct DescribeSource {
    path: String,
    table_output: bool,
    format: Arc<dyn TableFormat>,
    sample_size: usize,
    output: Option<std::vec::IntoIter<Tuple>>,
}

impl DescribeSource {
    fn infer(&self) -> Result<Vec<Tuple>, ExecError> {
        let mut reader = self.format.reader(&self.path)?;
        let mut usage: IndexMap<String, UsedTypes> = IndexMap::new();
        let mut sampled = 0usize;
        while sampled < self.sample_size {
            let Some(record) = reader.next_record()? else { break };
            for (key, value) in &record {
                usage.entry(key.clone()).or_default().merge(value);
            }
            sampled += 1;
        }
        reader.close();

        if self.table_output {
            let mut ddl = format!("CREATE TABLE \"{}\" (\n", self.path);
            for (name, types) in &usage {
                ddl.push_str(&format!("  {} {},\n", name, types.render()));
            }
            ddl.push(')');
            return Ok(vec![vec![Value::String(ddl)]]);
        }
        Ok(usage
            .iter()
            .map(|(name, types)| {
                vec![Value::String(name.clone()), Value::String(types.render())]
            })
            .collect())
    }
}

impl RowSource for DescribeSource {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        if self.output.is_none() {
            self.output = Some(self.infer()?.into_iter());
        }
        Ok(self.output.as_mut().and_then(|rows| rows.next()))
    }

    fn close(&mut self) {
        self.output = None;
    }
}

/// The set of shapes a key was seen with across the sample.
#[derive(Default)]
struct UsedTypes {
    boolean: bool,
    int: bool,
    float: bool,
    string: bool,
    element: Option<Box<UsedTypes>>,
    fields: Option<IndexMap<String, UsedTypes>>,
}

impl UsedTypes {
    fn merge(&mut self, value: &Value) {
        match value {
            Value::Null => {}
            Value::Bool(_) => self.boolean = true,
            Value::Number(n) => {
                if n.is_f64() {
                    self.float = true;
                } else {
                    self.int = true;
                }
            }
            Value::String(_) => self.string = true,
            Value::Array(items) => {
                let element = self.element.get_or_insert_with(Default::default);
                for item in items {
                    element.merge(item);
                }
            }
            Value::Object(entries) => {
                let fields = self.fields.get_or_insert_with(Default::default);
                for (key, item) in entries {
                    fields.entry(key.clone()).or_default().merge(item);
                }
            }
        }
    }

    fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.boolean {
            parts.push("bool".to_string());
        }
        // A key seen as both int and float is just a float column.
        if self.float {
            parts.push("float".to_string());
        } else if self.int {
            parts.push("int".to_string());
        }
        if self.string {
            parts.push("string".to_string());
        }
        if let Some(element) = &self.element {
            parts.push(format!("array<{}>", element.render()));
        }
        if let Some(fields) = &self.fields {
            let inner: Vec<String> =
                fields.iter().map(|(name, types)| format!("{}: {}", name, types.render())).collect();
            parts.push(format!("struct<{}>", inner.join(", ")));
        }
        if parts.is_empty() {
            return "unknown".to_string();
        }
        parts.join(" | ")
    }
}
