//! Semantic validation for parsed pipeline configuration values.

use anyhow::{bail, Result};

use crate::config::types::{PipelineConfig, StageConfig};
use crate::registry::StageRegistry;
use crate::stage::StageKind;

fn validate_stage_ref(
    stage: &StageConfig,
    kind: StageKind,
    registry: &StageRegistry,
    errors: &mut Vec<String>,
) {
    let name = stage.use_ref.trim();
    if name.is_empty() {
        errors.push(format!("{kind} stage reference (use) must not be empty"));
        return;
    }
    if !registry.contains(kind, name) {
        errors.push(format!(
            "Unknown {kind} stage '{name}' (available: {})",
            registry.names(kind).join(", ")
        ));
    }
}

/// Validate a parsed pipeline configuration against the stage registry.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// Stage parameters are not checked here; see
/// [`check_pipeline`](crate::orchestrator::check_pipeline).
///
/// # Errors
///
/// Returns an error listing all validation failures found in the pipeline config.
pub fn validate_pipeline(config: &PipelineConfig, registry: &StageRegistry) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    validate_stage_ref(&config.extract, StageKind::Extract, registry, &mut errors);
    if let Some(ref transform) = config.transform {
        validate_stage_ref(transform, StageKind::Transform, registry, &mut errors);
    }
    validate_stage_ref(&config.load, StageKind::Load, registry, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}
