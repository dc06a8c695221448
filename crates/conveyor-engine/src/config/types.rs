//! Serde models for pipeline YAML.

use conveyor_types::params::StageParams;
use serde::{Deserialize, Serialize};

use crate::run::RunParams;

/// Top-level pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub version: String,
    pub pipeline: String,
    pub extract: StageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<StageConfig>,
    pub load: StageConfig,
}

/// One stage reference plus the parameters handed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    #[serde(rename = "use")]
    pub use_ref: String,
    #[serde(default)]
    pub params: StageParams,
}

impl PipelineConfig {
    /// Per-phase params for [`PipelineRun::execute`](crate::run::PipelineRun::execute).
    #[must_use]
    pub fn run_params(&self) -> RunParams {
        RunParams {
            extract: self.extract.params.clone(),
            transform: self
                .transform
                .as_ref()
                .map(|t| t.params.clone())
                .unwrap_or_default(),
            load: self.load.params.clone(),
        }
    }
}
