use std::sync::Arc;

use crate::{
    config::EngineConfig,
    formats::FormatRegistry,
    logical::{
        PlanError, builder::build, fold::fold, parallelize::parallelize,
        populate_fields::populate_fields, validate::validate,
    },
    physical::{ExecError, ExecutionContext, PhysicalOperator, TupleStream, compile},
    query::{Field, Query, normalize::qualify_identifiers},
};

/// Front door of the engine. Owns the registered formats and the runtime
/// configuration, and turns queries into executable trees.
pub struct Engine {
    formats: FormatRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(formats: FormatRegistry, config: EngineConfig) -> Self {
        Self { formats, config }
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Runs the full planning pipeline: normalize, build, populate,
    /// validate, fold, parallelize, compile.
    pub fn plan(&self, query: Query) -> Result<PhysicalTree, PlanError> {
        let query = qualify_identifiers(query);
        tracing::debug!(?query, "normalized");
        let plan = build(query)?;
        let plan = populate_fields(plan);
        tracing::debug!(?plan, "populated");
        validate(&plan)?;
        let plan = fold(plan)?;
        let plan = parallelize(plan, &self.formats);
        tracing::debug!(?plan, "optimized");
        let root = compile(&plan, &self.formats, &self.config)?;
        Ok(PhysicalTree { root })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(FormatRegistry::new(), EngineConfig::default())
    }
}

/// A compiled query, ready to stream.
pub struct PhysicalTree {
    root: Arc<dyn PhysicalOperator>,
}

impl std::fmt::Debug for PhysicalTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalTree").field("root", &self.root.describe()).finish()
    }
}

impl PhysicalTree {
    pub fn column_aliases(&self) -> &[Field] {
        self.root.column_aliases()
    }

    pub fn execute(&self) -> Result<TupleStream, ExecError> {
        self.root.data(&ExecutionContext::new())
    }

    pub fn execute_with(&self, ctx: &ExecutionContext) -> Result<TupleStream, ExecError> {
        self.root.data(ctx)
    }
}
