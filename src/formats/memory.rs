use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{
    formats::{Record, TableFormat, TableReader, TableWriter},
    physical::exec_error::ExecError,
};

type Store = Arc<Mutex<HashMap<String, Vec<Vec<Record>>>>>;

/// In-memory tables, used as the engine's test and demo backend. A "path" is
/// just a table name in the shared store. Tables are lists of partitions;
/// when the format is created splittable, each partition is exposed as its
/// own split named `path#N`.
pub struct MemoryFormat {
    store: Store,
    splittable: bool,
    streaming: bool,
}

impl Default for MemoryFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFormat {
    pub fn new() -> Self {
        Self { store: Arc::default(), splittable: false, streaming: false }
    }

    pub fn new_splittable() -> Self {
        Self { splittable: true, ..Self::new() }
    }

    pub fn new_streaming() -> Self {
        Self { streaming: true, ..Self::new() }
    }

    /// Replaces `path` with a single-partition table. Non-object rows are
    /// dropped since a record is always an object.
    pub fn load(&self, path: &str, rows: Vec<Value>) {
        self.load_partitions(path, vec![rows]);
    }

    pub fn load_partitions(&self, path: &str, partitions: Vec<Vec<Value>>) {
        let partitions = partitions
            .into_iter()
            .map(|rows| {
                rows.into_iter()
                    .filter_map(|row| match row {
                        Value::Object(entries) => Some(entries),
                        _ => None,
                    })
                    .collect()
            })
            .collect();
        self.store.lock().unwrap().insert(path.to_string(), partitions);
    }

    /// All records of `path` across partitions, in load order. Handy for
    /// asserting what a query wrote.
    pub fn rows(&self, path: &str) -> Vec<Record> {
        self.store
            .lock()
            .unwrap()
            .get(path)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    fn resolve(&self, path: &str) -> Result<Vec<Record>, ExecError> {
        let store = self.store.lock().unwrap();
        if let Some((base, index)) = path.rsplit_once('#') {
            if let (Some(partitions), Ok(index)) = (store.get(base), index.parse::<usize>()) {
                return partitions
                    .get(index)
                    .cloned()
                    .ok_or_else(|| ExecError::Source(format!("no partition {index} in \"{base}\"")));
            }
        }
        store
            .get(path)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .ok_or_else(|| ExecError::Source(format!("unknown table \"{path}\"")))
    }
}

impl TableFormat for MemoryFormat {
    fn reader(&self, path: &str) -> Result<Box<dyn TableReader>, ExecError> {
        Ok(Box::new(MemoryReader { rows: self.resolve(path)?.into_iter() }))
    }

    fn writer(&self, path: &str, _fields: &[String]) -> Result<Box<dyn TableWriter>, ExecError> {
        self.store
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_insert_with(|| vec![vec![]]);
        Ok(Box::new(MemoryWriter { store: self.store.clone(), path: path.to_string() }))
    }

    fn splittable(&self) -> bool {
        self.splittable
    }

    fn splits(&self, path: &str) -> Vec<String> {
        if !self.splittable {
            return vec![path.to_string()];
        }
        let store = self.store.lock().unwrap();
        match store.get(path) {
            Some(partitions) if !partitions.is_empty() => {
                (0..partitions.len()).map(|i| format!("{path}#{i}")).collect()
            }
            _ => vec![path.to_string()],
        }
    }

    fn streaming(&self) -> bool {
        self.streaming
    }
}

struct MemoryReader {
    rows: std::vec::IntoIter<Record>,
}

impl TableReader for MemoryReader {
    fn next_record(&mut self) -> Result<Option<Record>, ExecError> {
        Ok(self.rows.next())
    }

    fn close(&mut self) {}
}

struct MemoryWriter {
    store: Store,
    path: String,
}

impl TableWriter for MemoryWriter {
    fn write(&mut self, record: &Record) -> Result<(), ExecError> {
        let mut store = self.store.lock().unwrap();
        let partitions = store
            .get_mut(&self.path)
            .ok_or_else(|| ExecError::Write(format!("table \"{}\" disappeared", self.path)))?;
        match partitions.first_mut() {
            Some(partition) => partition.push(record.clone()),
            None => partitions.push(vec![record.clone()]),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExecError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn reader_yields_loaded_rows_in_order() {
        let format = MemoryFormat::new();
        format.load("people", vec![json!({"name": "ada"}), json!({"name": "bob"})]);

        let mut reader = format.reader("people").unwrap();
        assert_eq!(reader.next_record().unwrap(), Some(rec(json!({"name": "ada"}))));
        assert_eq!(reader.next_record().unwrap(), Some(rec(json!({"name": "bob"}))));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn unknown_table_is_a_source_error() {
        let format = MemoryFormat::new();
        assert!(matches!(format.reader("missing"), Err(ExecError::Source(_))));
    }

    #[test]
    fn splits_expose_partitions_when_splittable() {
        let format = MemoryFormat::new_splittable();
        format.load_partitions(
            "t",
            vec![vec![json!({"a": 1})], vec![json!({"a": 2}), json!({"a": 3})]],
        );

        assert_eq!(format.splits("t"), vec!["t#0", "t#1"]);

        let mut first = format.reader("t#0").unwrap();
        assert_eq!(first.next_record().unwrap(), Some(rec(json!({"a": 1}))));
        assert_eq!(first.next_record().unwrap(), None);

        // Reading the base path still sees every partition.
        let mut all = format.reader("t").unwrap();
        let mut count = 0;
        while all.next_record().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn writer_appends_and_rows_reads_back() {
        let format = MemoryFormat::new();
        let mut writer = format.writer("out", &["a".to_string()]).unwrap();
        writer.write(&rec(json!({"a": 1}))).unwrap();
        writer.write(&rec(json!({"a": 2}))).unwrap();
        writer.close().unwrap();

        assert_eq!(format.rows("out"), vec![rec(json!({"a": 1})), rec(json!({"a": 2}))]);
    }

    #[test]
    fn non_object_rows_are_dropped_on_load() {
        let format = MemoryFormat::new();
        format.load("t", vec![json!(1), json!({"a": 1}), json!("x")]);
        assert_eq!(format.rows("t").len(), 1);
    }
}
