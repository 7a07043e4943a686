use std::fmt;

/// Semantic failure while planning. Planning aborts on the first error; a
/// partially planned tree is never returned.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    ColumnNotFound { field: String, available: Vec<String> },
    AmbiguousColumn { field: String, matches: Vec<String> },
    FunctionNotFound(String),
    FunctionArity { name: String, count: usize },
    /// An aggregate call outside a grouping projection.
    AggregateNotAllowed(String),
    MissingLateralAlias,
    /// Inline views must wrap a select statement.
    UnsupportedInlineView,
    /// A broken planning invariant, not a user error.
    Internal(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::ColumnNotFound { field, available } => {
                write!(f, "column \"{field}\" not found; available: {}", available.join(", "))
            }
            PlanError::AmbiguousColumn { field, matches } => {
                write!(f, "column \"{field}\" is ambiguous; matches: {}", matches.join(", "))
            }
            PlanError::FunctionNotFound(name) => write!(f, "function \"{name}\" not found"),
            PlanError::FunctionArity { name, count } => {
                write!(f, "function \"{name}\" does not accept {count} parameter(s)")
            }
            PlanError::AggregateNotAllowed(name) => {
                write!(f, "aggregate \"{name}\" is not allowed in this clause")
            }
            PlanError::MissingLateralAlias => write!(f, "lateral view expression requires an alias"),
            PlanError::UnsupportedInlineView => write!(f, "inline view must be a select statement"),
            PlanError::Internal(msg) => write!(f, "internal planning error: {msg}"),
        }
    }
}

impl std::error::Error for PlanError {}
