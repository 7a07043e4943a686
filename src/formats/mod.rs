use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::{physical::exec_error::ExecError, query::TableType};

pub mod memory;

/// One row of a table, as parsed by a format.
pub type Record = serde_json::Map<String, Value>;

/// Pull-based record source opened by a [`TableFormat`].
pub trait TableReader: Send {
    /// The next record, or `None` once the source is exhausted. A streaming
    /// format may block here until a record arrives.
    fn next_record(&mut self) -> Result<Option<Record>, ExecError>;

    /// Release the underlying resource. Must be safe to call more than once.
    fn close(&mut self);
}

/// Record sink opened by a [`TableFormat`].
pub trait TableWriter: Send {
    fn write(&mut self, record: &Record) -> Result<(), ExecError>;

    fn close(&mut self) -> Result<(), ExecError>;
}

/// A table encoding. The engine only ever talks to tables through this trait,
/// so a format decides how paths map to bytes and whether it supports
/// splitting or streaming.
pub trait TableFormat: Send + Sync {
    fn reader(&self, path: &str) -> Result<Box<dyn TableReader>, ExecError>;

    fn writer(&self, path: &str, fields: &[String]) -> Result<Box<dyn TableWriter>, ExecError>;

    /// Whether `splits` can break a path into independently readable parts.
    fn splittable(&self) -> bool {
        false
    }

    /// The independently readable parts of `path`. Each returned path must be
    /// accepted by `reader`, and reading all of them must yield the same
    /// multiset of records as reading `path` directly.
    fn splits(&self, path: &str) -> Vec<String> {
        vec![path.to_string()]
    }

    /// Whether sources of this format are unbounded. Unbounded sources make
    /// grouping operators emit incrementally instead of waiting for the end
    /// of input.
    fn streaming(&self) -> bool {
        false
    }
}

/// Maps each [`TableType`] to the format implementation that serves it.
#[derive(Default, Clone)]
pub struct FormatRegistry {
    by_type: HashMap<TableType, Arc<dyn TableFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self { by_type: HashMap::new() }
    }

    pub fn register(&mut self, table_type: TableType, format: Arc<dyn TableFormat>) {
        self.by_type.insert(table_type, format);
    }

    pub fn get(&self, table_type: TableType) -> Option<Arc<dyn TableFormat>> {
        self.by_type.get(&table_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::memory::MemoryFormat;
    use serde_json::json;

    #[test]
    fn registry_routes_by_table_type() {
        let mut registry = FormatRegistry::new();
        let format = Arc::new(MemoryFormat::new());
        format.load("t", vec![json!({"a": 1})]);
        registry.register(TableType::Json, format);

        assert!(registry.get(TableType::Json).is_some());
        assert!(registry.get(TableType::Csv).is_none());

        let mut reader = registry.get(TableType::Json).unwrap().reader("t").unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(json!({"a": 1}).as_object().cloned().unwrap()));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn default_format_is_not_splittable_or_streaming() {
        let format = MemoryFormat::new();
        assert!(!TableFormat::splittable(&format));
        assert!(!TableFormat::streaming(&format));
        assert_eq!(format.splits("anything"), vec!["anything".to_string()]);
    }
}
