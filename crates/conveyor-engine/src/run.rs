//! A single extract → transform → load execution over one dataset.

use std::sync::Arc;
use std::time::Instant;

use conveyor_types::error::StageError;
use conveyor_types::params::StageParams;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::errors::{PipelineError, RunStateError};
use crate::stage::{Extractor, Loader, StageKind, Transformer};

/// Where a [`PipelineRun`] is in its lifecycle. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Ready,
    Extracted,
    Transformed,
    Loaded,
    /// A stage failed; every further call is rejected.
    Aborted,
}

/// Row counts and per-phase timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub rows_extracted: u64,
    pub rows_loaded: u64,
    pub columns_loaded: usize,
    pub extract_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_secs: Option<f64>,
    pub load_secs: f64,
}

/// Stage parameters for [`PipelineRun::execute`].
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub extract: StageParams,
    pub transform: StageParams,
    pub load: StageParams,
}

/// Owns one stage of each capability and the dataset flowing between them.
///
/// The chaining methods return `Result<&mut Self, _>` so a run reads as
/// `run.extract(&p)?.transform(&p)?.load(&p)?`. The first stage failure
/// moves the run to [`RunPhase::Aborted`] and is returned to the caller.
pub struct PipelineRun {
    name: String,
    extractor: Arc<dyn Extractor>,
    transformer: Option<Arc<dyn Transformer>>,
    loader: Arc<dyn Loader>,
    data: Option<Dataset>,
    phase: RunPhase,
    report: RunReport,
}

impl PipelineRun {
    pub fn new(
        name: impl Into<String>,
        extractor: Arc<dyn Extractor>,
        loader: Arc<dyn Loader>,
    ) -> Self {
        let name = name.into();
        Self {
            report: RunReport {
                pipeline: name.clone(),
                ..RunReport::default()
            },
            name,
            extractor,
            transformer: None,
            loader,
            data: None,
            phase: RunPhase::Ready,
        }
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// The current data handle, if extract has run.
    #[must_use]
    pub fn dataset(&self) -> Option<&Dataset> {
        self.data.as_ref()
    }

    /// Run the extract stage and keep its output as the current dataset.
    ///
    /// # Errors
    ///
    /// `State` if extract already ran or the run was aborted; `Stage` if the
    /// extractor fails.
    pub fn extract(&mut self, params: &StageParams) -> Result<&mut Self, PipelineError> {
        match self.phase {
            RunPhase::Ready => {}
            RunPhase::Aborted => return Err(RunStateError::Aborted.into()),
            _ => return Err(RunStateError::AlreadyExtracted.into()),
        }

        let stage = self.extractor.name();
        let start = Instant::now();
        let result = self.extractor.extract(params);
        let secs = start.elapsed().as_secs_f64();
        let data = result.map_err(|e| self.abort(StageKind::Extract, stage, e))?;

        self.report.rows_extracted = data.num_rows() as u64;
        self.report.extract_secs = secs;
        tracing::info!(
            pipeline = %self.name,
            stage,
            rows = data.num_rows(),
            columns = data.num_columns(),
            elapsed_secs = secs,
            "Extract complete"
        );
        self.data = Some(data);
        self.phase = RunPhase::Extracted;
        Ok(self)
    }

    /// Run the configured transform stage over the current dataset.
    ///
    /// Without a configured transformer this only advances the phase.
    ///
    /// # Errors
    ///
    /// `State` if extract has not run, transform already ran, or the run was
    /// aborted; `Stage` if the transformer fails.
    pub fn transform(&mut self, params: &StageParams) -> Result<&mut Self, PipelineError> {
        match self.phase {
            RunPhase::Extracted => {}
            RunPhase::Ready => return Err(RunStateError::NotExtracted.into()),
            RunPhase::Transformed => return Err(RunStateError::AlreadyTransformed.into()),
            RunPhase::Loaded => return Err(RunStateError::AlreadyLoaded.into()),
            RunPhase::Aborted => return Err(RunStateError::Aborted.into()),
        }

        let Some(transformer) = self.transformer.clone() else {
            tracing::debug!(pipeline = %self.name, "No transform configured, passing dataset through");
            self.phase = RunPhase::Transformed;
            return Ok(self);
        };

        let data = self.data.take().ok_or(RunStateError::NotExtracted)?;
        let stage = transformer.name();
        let start = Instant::now();
        let result = transformer.transform(data, params);
        let secs = start.elapsed().as_secs_f64();
        let data = result.map_err(|e| self.abort(StageKind::Transform, stage, e))?;

        self.report.transform_secs = Some(secs);
        tracing::info!(
            pipeline = %self.name,
            stage,
            rows = data.num_rows(),
            columns = data.num_columns(),
            elapsed_secs = secs,
            "Transform complete"
        );
        self.data = Some(data);
        self.phase = RunPhase::Transformed;
        Ok(self)
    }

    /// Hand the current dataset to the load stage.
    ///
    /// # Errors
    ///
    /// `State` if no dataset exists yet, a configured transform has not run,
    /// load already ran, or the run was aborted; `Stage` if the loader fails.
    pub fn load(&mut self, params: &StageParams) -> Result<&mut Self, PipelineError> {
        match self.phase {
            RunPhase::Transformed => {}
            RunPhase::Extracted if self.transformer.is_none() => {}
            RunPhase::Extracted => return Err(RunStateError::TransformPending.into()),
            RunPhase::Ready => return Err(RunStateError::NotExtracted.into()),
            RunPhase::Loaded => return Err(RunStateError::AlreadyLoaded.into()),
            RunPhase::Aborted => return Err(RunStateError::Aborted.into()),
        }

        let stage = self.loader.name();
        let data = self.data.as_ref().ok_or(RunStateError::NotExtracted)?;
        let (rows, columns) = (data.num_rows(), data.num_columns());
        let start = Instant::now();
        let result = self.loader.load(data, params);
        let secs = start.elapsed().as_secs_f64();
        result.map_err(|e| self.abort(StageKind::Load, stage, e))?;

        self.report.rows_loaded = rows as u64;
        self.report.columns_loaded = columns;
        self.report.load_secs = secs;
        tracing::info!(
            pipeline = %self.name,
            stage,
            rows,
            elapsed_secs = secs,
            "Load complete"
        );
        self.phase = RunPhase::Loaded;
        Ok(self)
    }

    /// Run all three phases in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] raised by any phase.
    pub fn execute(&mut self, params: &RunParams) -> Result<RunReport, PipelineError> {
        self.extract(&params.extract)?
            .transform(&params.transform)?
            .load(&params.load)?;
        Ok(self.report.clone())
    }

    fn abort(&mut self, kind: StageKind, stage: &str, err: StageError) -> PipelineError {
        tracing::error!(pipeline = %self.name, %kind, stage, error = %err, "Stage failed");
        self.phase = RunPhase::Aborted;
        self.data = None;
        PipelineError::stage(kind, stage, err)
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("name", &self.name)
            .field("extractor", &self.extractor.name())
            .field("transformer", &self.transformer.as_ref().map(|t| t.name()))
            .field("loader", &self.loader.name())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
