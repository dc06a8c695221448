//! Pipeline orchestrator: resolves stages from config and executes runs.

use anyhow::anyhow;
use conveyor_types::error::{StageError, ValidationResult};
use serde::Serialize;

use crate::config::types::PipelineConfig;
use crate::errors::PipelineError;
use crate::registry::StageRegistry;
use crate::run::{PipelineRun, RunReport};
use crate::stage::StageKind;

/// Result of a pipeline check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub extract: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<ValidationResult>,
    pub load: ValidationResult,
}

impl CheckResult {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        use conveyor_types::error::ValidationStatus::Success;
        self.extract.status == Success
            && self.load.status == Success
            && self.transform.as_ref().map_or(true, |t| t.status == Success)
    }
}

fn unknown_stage(kind: StageKind, name: &str) -> PipelineError {
    PipelineError::Infrastructure(anyhow!("Unknown {kind} stage '{name}'"))
}

/// Resolve the stages named in `config` into a ready-to-run [`PipelineRun`].
///
/// # Errors
///
/// Returns `Infrastructure` if any stage name is not registered.
pub fn build_run(
    config: &PipelineConfig,
    registry: &StageRegistry,
) -> Result<PipelineRun, PipelineError> {
    let extractor = registry
        .extractor(&config.extract.use_ref)
        .ok_or_else(|| unknown_stage(StageKind::Extract, &config.extract.use_ref))?;
    let loader = registry
        .loader(&config.load.use_ref)
        .ok_or_else(|| unknown_stage(StageKind::Load, &config.load.use_ref))?;

    let run = PipelineRun::new(config.pipeline.clone(), extractor, loader);
    match config.transform {
        Some(ref t) => {
            let transformer = registry
                .transformer(&t.use_ref)
                .ok_or_else(|| unknown_stage(StageKind::Transform, &t.use_ref))?;
            Ok(run.with_transformer(transformer))
        }
        None => Ok(run),
    }
}

/// Run a full pipeline: extract → transform → load.
///
/// Stages perform blocking file I/O, so the run executes on the blocking pool.
///
/// # Errors
///
/// Returns the first stage or state error, or `Infrastructure` if stage
/// resolution fails or the blocking task panics.
pub async fn run_pipeline(
    config: &PipelineConfig,
    registry: &StageRegistry,
) -> Result<RunReport, PipelineError> {
    let mut run = build_run(config, registry)?;
    let params = config.run_params();
    tracing::info!(
        pipeline = config.pipeline,
        extract = config.extract.use_ref,
        transform = config.transform.as_ref().map(|t| t.use_ref.as_str()),
        load = config.load.use_ref,
        "Starting pipeline run"
    );

    let report = tokio::task::spawn_blocking(move || run.execute(&params))
        .await
        .map_err(|e| PipelineError::Infrastructure(anyhow!("pipeline task panicked: {e}")))??;

    tracing::info!(
        pipeline = config.pipeline,
        rows = report.rows_loaded,
        "Pipeline run complete"
    );
    Ok(report)
}

fn to_validation(stage: &str, result: Result<(), StageError>) -> ValidationResult {
    match result {
        Ok(()) => ValidationResult::success(format!("{stage}: params OK")),
        Err(e) => ValidationResult::failed(format!("{stage}: {e}")),
    }
}

/// Check every stage's params without reading or writing any data.
///
/// # Errors
///
/// Returns `Infrastructure` if any stage name is not registered.
pub fn check_pipeline(
    config: &PipelineConfig,
    registry: &StageRegistry,
) -> Result<CheckResult, PipelineError> {
    let extractor = registry
        .extractor(&config.extract.use_ref)
        .ok_or_else(|| unknown_stage(StageKind::Extract, &config.extract.use_ref))?;
    let loader = registry
        .loader(&config.load.use_ref)
        .ok_or_else(|| unknown_stage(StageKind::Load, &config.load.use_ref))?;

    let transform = match config.transform {
        Some(ref t) => {
            let transformer = registry
                .transformer(&t.use_ref)
                .ok_or_else(|| unknown_stage(StageKind::Transform, &t.use_ref))?;
            Some(to_validation(&t.use_ref, transformer.validate(&t.params)))
        }
        None => None,
    };

    Ok(CheckResult {
        extract: to_validation(
            &config.extract.use_ref,
            extractor.validate(&config.extract.params),
        ),
        transform,
        load: to_validation(&config.load.use_ref, loader.validate(&config.load.params)),
    })
}
