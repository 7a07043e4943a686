pub mod config;
pub mod executor;
pub mod formats;
pub mod functions;
pub mod logical;
pub mod physical;
pub mod query;

pub use config::EngineConfig;
pub use executor::{Engine, PhysicalTree};
pub use formats::{FormatRegistry, Record, TableFormat, TableReader, TableWriter};
pub use logical::PlanError;
pub use physical::ExecError;
pub use query::Query;
