use std::fmt;

/// Runtime failure while pulling tuples through a physical plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    /// A source could not be opened or read.
    Source(String),
    /// A sink could not be opened or written.
    Write(String),
    /// A parallel worker failed; carries the worker's rendered error.
    Worker(String),
    /// A broken plan invariant. Seeing this means the planner produced a tree
    /// the operators cannot execute.
    Internal(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Source(msg) => write!(f, "source error: {msg}"),
            ExecError::Write(msg) => write!(f, "write error: {msg}"),
            ExecError::Worker(msg) => write!(f, "worker error: {msg}"),
            ExecError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ExecError {}
