//! Shared conveyor stage, parameter, and error model types.
//!
//! Kept free of I/O dependencies so stage implementations outside the engine
//! can depend on it directly.

pub mod error;
pub mod params;

pub use error::{ErrorCategory, StageError, ValidationResult, ValidationStatus};
pub use params::StageParams;
