pub mod describe;
pub mod explain;
pub mod filter;
pub mod gather;
pub mod group_by;
pub mod join;
pub mod lateral_view;
pub mod limit;
pub mod project;
pub mod scan;
pub mod sort;
pub mod streaming_group_by;
pub mod write;

#[cfg(test)]
pub mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::{
        formats::{FormatRegistry, memory::MemoryFormat},
        physical::{ExecError, ExecutionContext, PhysicalOperator, Tuple},
        query::TableType,
    };

    /// A memory-backed format registry with one preloaded JSON table.
    pub fn mk_registry(path: &str, rows: Vec<Value>) -> (FormatRegistry, Arc<MemoryFormat>) {
        let format = Arc::new(MemoryFormat::new());
        format.load(path, rows);
        let mut registry = FormatRegistry::new();
        registry.register(TableType::Json, format.clone());
        (registry, format)
    }

    pub fn drain(op: &dyn PhysicalOperator) -> Result<Vec<Tuple>, ExecError> {
        op.data(&ExecutionContext::new())?.collect()
    }
}
