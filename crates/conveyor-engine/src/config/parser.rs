//! YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::config::types::PipelineConfig;
use crate::dispatch::DispatchSettings;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();

    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        match std::env::var(&cap[1]) {
            Ok(val) => val,
            Err(_) => {
                missing.push(cap[1].to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

fn parse_yaml_str<T: DeserializeOwned>(yaml_str: &str, what: &str) -> Result<T> {
    let substituted = substitute_env_vars(yaml_str)?;
    serde_yaml::from_str(&substituted).with_context(|| format!("Failed to parse {what} YAML"))
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file: {}", path.display()))
}

/// Parse a pipeline YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_pipeline_str(yaml_str: &str) -> Result<PipelineConfig> {
    parse_yaml_str(yaml_str, "pipeline")
}

/// Parse a pipeline YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_pipeline(path: &Path) -> Result<PipelineConfig> {
    parse_pipeline_str(&read_file(path, "pipeline")?)
}

/// Parse dispatch settings YAML (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_dispatch_settings_str(yaml_str: &str) -> Result<DispatchSettings> {
    parse_yaml_str(yaml_str, "dispatch settings")
}

/// Parse a dispatch settings YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_dispatch_settings(path: &Path) -> Result<DispatchSettings> {
    parse_dispatch_settings_str(&read_file(path, "dispatch settings")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CV_TEST_INPUT", "/data/in.csv");
        let input = "path: ${CV_TEST_INPUT}\ndelimiter: ','";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("/data/in.csv"));
        assert!(!result.contains("${CV_TEST_INPUT}"));
        std::env::remove_var("CV_TEST_INPUT");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "path: in.csv\nhas_header: true";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let input = "${CV_MISSING_X} and ${CV_MISSING_Y}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err_msg.contains("CV_MISSING_X"));
        assert!(err_msg.contains("CV_MISSING_Y"));
    }

    #[test]
    fn test_parse_pipeline_from_string() {
        std::env::set_var("CV_TEST_OUT_DIR", "/tmp/out");
        let yaml = r#"
version: "1.0"
pipeline: drop_email
extract:
  use: csv
  params:
    path: users.csv
transform:
  use: drop_columns
  params:
    columns: [email]
load:
  use: csv
  params:
    path: ${CV_TEST_OUT_DIR}/users.csv
"#;
        let config = parse_pipeline_str(yaml).unwrap();
        assert_eq!(config.pipeline, "drop_email");
        assert_eq!(config.extract.use_ref, "csv");
        assert_eq!(config.transform.as_ref().unwrap().use_ref, "drop_columns");
        assert_eq!(
            config.load.params.require_str("path").unwrap(),
            "/tmp/out/users.csv"
        );
        let params = config.run_params();
        assert!(params.transform.contains("columns"));
        std::env::remove_var("CV_TEST_OUT_DIR");
    }

    #[test]
    fn test_transform_is_optional() {
        let yaml = r#"
version: "1.0"
pipeline: copy
extract: { use: csv, params: { path: a.csv } }
load: { use: csv, params: { path: b.csv } }
"#;
        let config = parse_pipeline_str(yaml).unwrap();
        assert!(config.transform.is_none());
        assert!(config.run_params().transform.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "1.0"
pipeline: copy
extract: { use: csv }
load: { use: csv }
destination: { use: csv }
"#;
        let err = format!("{:#}", parse_pipeline_str(yaml).unwrap_err());
        assert!(err.contains("unknown field"), "got: {err}");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_pipeline_str(yaml).is_err());
    }

    #[test]
    fn test_parse_pipeline_file_not_found() {
        let err_msg = parse_pipeline(Path::new("/nonexistent/pipeline.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("Failed to read pipeline file"));
    }

    #[test]
    fn test_parse_dispatch_settings() {
        let yaml = r#"
base_url: http://jobs.internal:8080
poll_interval_secs: 3
deadline_secs: 600
failure_states: [FAILED, CANCELLED]
"#;
        let settings = parse_dispatch_settings_str(yaml).unwrap();
        assert_eq!(settings.base_url, "http://jobs.internal:8080");
        assert_eq!(settings.poll_interval(), Duration::from_secs(3));
        assert_eq!(settings.deadline(), Some(Duration::from_secs(600)));
        assert_eq!(settings.failure_states, vec!["FAILED", "CANCELLED"]);
    }

    #[test]
    fn test_parse_dispatch_settings_rejects_zero_poll_interval() {
        let err = parse_dispatch_settings_str("base_url: x\npoll_interval_secs: 0").unwrap_err();
        assert!(format!("{err:#}").contains("poll interval must be at least 1 second"));
    }
}
