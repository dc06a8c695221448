//! Pipeline error model.

use conveyor_types::error::StageError;

use crate::stage::StageKind;

// ---------------------------------------------------------------------------
// RunStateError: out-of-order use of a PipelineRun
// ---------------------------------------------------------------------------

/// A [`PipelineRun`](crate::run::PipelineRun) method was called in a phase
/// that does not allow it. Raised before any stage is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RunStateError {
    #[error("extract has not produced a dataset yet")]
    NotExtracted,
    #[error("extract already ran for this pipeline run")]
    AlreadyExtracted,
    #[error("transform already ran for this pipeline run")]
    AlreadyTransformed,
    #[error("a transform stage is configured but has not run")]
    TransformPending,
    #[error("load already ran for this pipeline run")]
    AlreadyLoaded,
    #[error("pipeline run aborted after an earlier stage failure")]
    Aborted,
}

// ---------------------------------------------------------------------------
// PipelineError: categorised errors surfaced by pipeline runs
// ---------------------------------------------------------------------------

/// Categorized pipeline error.
///
/// `Stage` wraps the typed [`StageError`] raised by a stage together with the
/// capability and stage name that produced it. `State` reports misuse of the
/// run's phase ordering. `Infrastructure` wraps opaque host-side failures
/// (config parsing, task joins, registry lookups).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{kind} stage '{stage}' failed: {source}")]
    Stage {
        kind: StageKind,
        stage: String,
        #[source]
        source: StageError,
    },
    #[error("invalid pipeline state: {0}")]
    State(#[from] RunStateError),
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    pub(crate) fn stage(kind: StageKind, stage: &str, source: StageError) -> Self {
        Self::Stage {
            kind,
            stage: stage.to_string(),
            source,
        }
    }

    /// Returns the typed stage error if this is a `Stage` variant.
    pub fn as_stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the phase-ordering error if this is a `State` variant.
    pub fn as_state_error(&self) -> Option<RunStateError> {
        match self {
            Self::State(e) => Some(*e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_types::error::ErrorCategory;

    #[test]
    fn test_stage_error_display_names_stage() {
        let err = PipelineError::stage(
            StageKind::Load,
            "csv",
            StageError::missing_param("path"),
        );
        let msg = err.to_string();
        assert!(msg.contains("load stage 'csv'"));
        assert!(msg.contains("MISSING_PARAM"));
        assert_eq!(
            err.as_stage_error().map(|e| e.category),
            Some(ErrorCategory::Config)
        );
        assert!(err.as_state_error().is_none());
    }

    #[test]
    fn test_state_error_from_run_state() {
        let err: PipelineError = RunStateError::NotExtracted.into();
        assert_eq!(err.as_state_error(), Some(RunStateError::NotExtracted));
        assert!(err.to_string().contains("has not produced a dataset"));
    }

    #[test]
    fn test_pipeline_error_from_anyhow() {
        let pe: PipelineError = anyhow::anyhow!("registry lookup failed").into();
        assert!(matches!(pe, PipelineError::Infrastructure(_)));
        assert!(pe.as_stage_error().is_none());
        assert_eq!(pe.to_string(), "registry lookup failed");
    }
}
