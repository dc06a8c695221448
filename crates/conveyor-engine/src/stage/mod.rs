//! Stage capability traits and the built-in stage implementations.
//!
//! A stage implements exactly one capability. Adding a storage format means
//! adding a new type that implements the matching trait and registering it
//! in the [`StageRegistry`](crate::registry::StageRegistry); the run and the
//! orchestrator only ever see `dyn` trait objects.

mod csv;
mod drop_columns;

use std::fmt;

use conveyor_types::error::StageError;
use conveyor_types::params::StageParams;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

pub use self::csv::{CsvExtractor, CsvLoader};
pub use self::drop_columns::DropColumns;

/// The capability a stage provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Load => "load",
        };
        f.write_str(s)
    }
}

/// Produces a dataset from an external location.
pub trait Extractor: Send + Sync {
    /// Registry name, e.g. `"csv"`.
    fn name(&self) -> &'static str;

    /// Check `params` without touching any data.
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first invalid parameter.
    fn validate(&self, _params: &StageParams) -> Result<(), StageError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Config errors are raised before any I/O; I/O and data errors afterwards.
    fn extract(&self, params: &StageParams) -> Result<Dataset, StageError>;
}

/// Rewrites a dataset.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns a config error describing the first invalid parameter.
    fn validate(&self, _params: &StageParams) -> Result<(), StageError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a config error for bad params, or a data error when the
    /// dataset cannot be transformed as requested.
    fn transform(&self, data: Dataset, params: &StageParams) -> Result<Dataset, StageError>;
}

/// Writes a dataset to an external location.
pub trait Loader: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns a config error describing the first invalid parameter.
    fn validate(&self, _params: &StageParams) -> Result<(), StageError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Config errors are raised before any I/O; I/O errors afterwards.
    fn load(&self, data: &Dataset, params: &StageParams) -> Result<(), StageError>;
}
