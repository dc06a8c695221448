use std::path::Path;

use anyhow::{Context, Result};

use conveyor_engine::config::{parser, validator};
use conveyor_engine::{orchestrator, StageRegistry};

/// Execute the `run` command: parse, validate, and run a pipeline.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate
    let registry = StageRegistry::builtin();
    validator::validate_pipeline(&config, &registry)?;

    tracing::info!(
        pipeline = config.pipeline,
        extract = config.extract.use_ref,
        load = config.load.use_ref,
        "Pipeline validated"
    );

    // 3. Run
    let report = orchestrator::run_pipeline(&config, &registry).await?;

    eprintln!("Pipeline '{}' completed successfully.", report.pipeline);
    eprintln!("  Rows extracted:  {}", report.rows_extracted);
    eprintln!("  Rows loaded:     {}", report.rows_loaded);
    eprintln!("  Columns loaded:  {}", report.columns_loaded);
    eprintln!("  Extract:         {:.3}s", report.extract_secs);
    if let Some(secs) = report.transform_secs {
        eprintln!("  Transform:       {secs:.3}s");
    }
    eprintln!("  Load:            {:.3}s", report.load_secs);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
