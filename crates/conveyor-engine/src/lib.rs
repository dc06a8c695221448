//! Core orchestration crate for conveyor.
//!
//! Two independent halves live here:
//!
//! - **Pipelines**: [`stage`] defines the extract/transform/load capability
//!   traits and the built-in stages, [`run::PipelineRun`] chains one stage of
//!   each kind over a single [`dataset::Dataset`], and [`orchestrator`] builds
//!   runs from parsed YAML [`config`].
//! - **Job dispatch**: [`dispatch`] submits a job to a remote execution
//!   service exactly once and polls its status until it succeeds, fails, or
//!   the caller cancels. [`script`] runs parameterised SQL scripts through an
//!   external executor.

pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod orchestrator;
pub mod registry;
pub mod run;
pub mod script;
pub mod secrets;
pub mod stage;

// Re-export public API for convenience
pub use dataset::Dataset;
pub use dispatch::{
    handle_dispatch_event, DispatchError, DispatchEvent, DispatchResponse, DispatchSettings,
    HttpJobService, JobDispatcher, JobOutcome, JobRequest, JobService, SettingsError,
};
pub use errors::{PipelineError, RunStateError};
pub use orchestrator::{check_pipeline, run_pipeline, CheckResult};
pub use registry::StageRegistry;
pub use run::{PipelineRun, RunPhase, RunReport};
pub use script::{handle_script_event, ScriptError, ScriptEvent, ScriptResponse};
pub use secrets::{EnvSecretStore, FileSecretStore, SecretError, SecretFields, SecretStore};
pub use stage::{Extractor, Loader, StageKind, Transformer};
