use std::path::Path;

use anyhow::{Context, Result};
use conveyor_types::error::{ValidationResult, ValidationStatus};

use conveyor_engine::config::{parser, validator};
use conveyor_engine::{orchestrator, StageRegistry};

/// Execute the `check` command: validate pipeline structure and stage params.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate pipeline structure
    let registry = StageRegistry::builtin();
    validator::validate_pipeline(&config, &registry)?;
    println!("Pipeline structure: OK");

    // 3. Check stage params
    let result = orchestrator::check_pipeline(&config, &registry)?;

    print_validation("Extract", &result.extract);
    if let Some(ref transform) = result.transform {
        print_validation("Transform", transform);
    }
    print_validation("Load", &result.load);

    if result.all_passed() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_validation(label: &str, result: &ValidationResult) {
    let status = match result.status {
        ValidationStatus::Success => "OK",
        ValidationStatus::Failed => "FAILED",
    };
    println!("{:18} {}", format!("{label}:"), status);
    if !result.message.is_empty() {
        println!("  {}", result.message);
    }
}
