use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::{
    config::EngineConfig,
    formats::FormatRegistry,
    logical::{LogicalOperator, PlanError},
    query::Field,
};

pub mod exec_error;
pub mod expressions;
pub mod operators;

pub use exec_error::ExecError;

/// One output row, positionally aligned with the producing operator's
/// `column_aliases`. No column is ever referenced by name at execution time.
pub type Tuple = Vec<Value>;

/// Per-execution state handed to every `data` call. Gather uses path
/// overrides to re-execute a compiled subtree against one split at a time.
#[derive(Default, Clone)]
pub struct ExecutionContext {
    path_overrides: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, path: &str, replacement: &str) -> Self {
        self.path_overrides.insert(path.to_string(), replacement.to_string());
        self
    }

    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        self.path_overrides.get(path).map(String::as_str).unwrap_or(path)
    }
}

/// The pulled side of an operator. Implementations open their resources
/// lazily on the first `next_tuple` call.
pub trait RowSource: Send {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError>;

    /// Release everything the source opened. Called at most once.
    fn close(&mut self);
}

/// Owning handle over a [`RowSource`]: closing is idempotent and happens
/// automatically on drop, so early termination (Limit, errors, caller drops)
/// always releases resources exactly once.
pub struct TupleStream {
    source: Option<Box<dyn RowSource>>,
}

impl TupleStream {
    pub fn new(source: Box<dyn RowSource>) -> Self {
        Self { source: Some(source) }
    }

    pub fn next_tuple(&mut self) -> Result<Option<Tuple>, ExecError> {
        match self.source.as_mut() {
            Some(source) => match source.next_tuple() {
                Ok(None) => {
                    self.close();
                    Ok(None)
                }
                other => other,
            },
            None => Ok(None),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }
}

impl Drop for TupleStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Iterator for TupleStream {
    type Item = Result<Tuple, ExecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}

/// Runtime counterpart of a logical operator. Construction is cheap and does
/// no I/O; all work happens inside the stream returned by `data`.
pub trait PhysicalOperator: Send + Sync {
    fn column_aliases(&self) -> &[Field];

    fn data(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError>;

    /// One-line rendering for explain output.
    fn describe(&self) -> String;

    fn children(&self) -> Vec<&dyn PhysicalOperator>;
}

/// Compiles a planned logical tree into physical operators. Expression
/// compilation against the upstream column layout happens lazily inside each
/// operator's `data` call; this step only picks operator shapes and binds
/// formats.
pub fn compile(
    op: &LogicalOperator,
    formats: &FormatRegistry,
    config: &EngineConfig,
) -> Result<Arc<dyn PhysicalOperator>, PlanError> {
    use operators::*;

    Ok(match op {
        LogicalOperator::DataSource { table, alias } => {
            Arc::new(scan::TableScan::new(table, alias.clone(), lookup_format(table, formats)?))
        }
        LogicalOperator::Filter { predicate, source } => Arc::new(filter::Filter::new(
            predicate.clone(),
            compile(source, formats, config)?,
        )),
        LogicalOperator::Project { expressions, source, alias } => Arc::new(project::Project::new(
            expressions.clone(),
            alias.clone(),
            compile(source, formats, config)?,
        )),
        LogicalOperator::GroupBy { expressions, group_by, source, alias } => {
            let child = compile(source, formats, config)?;
            let streaming = find_table(source)
                .and_then(|table| formats.get(table.table_type))
                .map(|format| format.streaming())
                .unwrap_or(false);
            if streaming {
                Arc::new(streaming_group_by::StreamingGroupBy::new(
                    expressions.clone(),
                    group_by.clone(),
                    alias.clone(),
                    child,
                    config.clone(),
                ))
            } else {
                Arc::new(group_by::GroupBy::new(
                    expressions.clone(),
                    group_by.clone(),
                    alias.clone(),
                    child,
                    config.clone(),
                ))
            }
        }
        LogicalOperator::Sort { keys, source } => {
            Arc::new(sort::Sort::new(keys.clone(), compile(source, formats, config)?))
        }
        LogicalOperator::Limit { limit, source } => {
            Arc::new(limit::Limit::new(*limit, compile(source, formats, config)?))
        }
        LogicalOperator::Join { left, right, condition } => Arc::new(join::Join::new(
            compile(left, formats, config)?,
            compile(right, formats, config)?,
            condition.clone(),
        )),
        LogicalOperator::LateralView { expression, source } => Arc::new(
            lateral_view::LateralView::new(expression.clone(), compile(source, formats, config)?),
        ),
        LogicalOperator::Describe { table, table_output } => Arc::new(describe::Describe::new(
            table.clone(),
            *table_output,
            lookup_format(table, formats)?,
            config.describe_sample_size,
        )),
        LogicalOperator::Explain { source } => {
            Arc::new(explain::Explain::new(compile(source, formats, config)?))
        }
        LogicalOperator::Gather { source } => {
            let table = find_table(source).ok_or_else(|| {
                PlanError::Internal("gather subtree has no data source".to_string())
            })?;
            Arc::new(gather::Gather::new(
                compile(source, formats, config)?,
                table.path.clone(),
                lookup_format(table, formats)?,
                config.clone(),
            ))
        }
        LogicalOperator::Write { table, source } => Arc::new(write::Write::new(
            table.clone(),
            lookup_format(table, formats)?,
            compile(source, formats, config)?,
        )),
    })
}

fn lookup_format(
    table: &crate::query::Table,
    formats: &FormatRegistry,
) -> Result<Arc<dyn crate::formats::TableFormat>, PlanError> {
    formats.get(table.table_type).ok_or_else(|| {
        PlanError::Internal(format!("no format registered for {:?}", table.table_type))
    })
}

/// The single data source feeding a subtree, if there is exactly one path to
/// a leaf. Used to bind Gather splits and to detect streaming inputs.
fn find_table(op: &LogicalOperator) -> Option<&crate::query::Table> {
    match op {
        LogicalOperator::DataSource { table, .. } => Some(table),
        LogicalOperator::Describe { .. } => None,
        _ => {
            let children = op.children();
            match children.as_slice() {
                [only] => find_table(only),
                _ => None,
            }
        }
    }
}
