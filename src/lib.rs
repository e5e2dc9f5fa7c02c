#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

//! Statistical computation engine
//!
//! Weighted frequencies and percentiles, rank-based nonparametric tests
//! (Mann-Whitney U, Kruskal-Wallis H, two-sample Kolmogorov-Smirnov, runs),
//! descriptive statistics and OLS regression with diagnostics. Analyses run
//! inside isolated compute units managed by an [`execution::Registry`] and
//! return tagged result tables.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod execution;
pub mod linalg;
pub mod output;
pub mod stats;

// Re-export commonly used types
pub use analysis::{AnalysisContext, ComputeModule};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use data::{CellValue, GroupDefinition, GroupedSample, ValidatedSample, Variable, VariableKind};
pub use error::{Error, Result};
pub use execution::{Registry, Task, UnitStatus};
pub use linalg::Matrix;
pub use output::{AnalysisOutput, Cell, ColumnHeader, Row, Table};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
