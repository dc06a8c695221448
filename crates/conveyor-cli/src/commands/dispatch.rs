use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use conveyor_engine::config::parser;
use conveyor_engine::dispatch::{
    handle_dispatch_event, DispatchSettings, HttpJobService, JobDispatcher,
};
use conveyor_engine::secrets::{EnvSecretStore, FileSecretStore, SecretStore};

#[derive(Debug, Args)]
pub struct DispatchArgs {
    /// Path to the dispatch event JSON, or `-` to read it from stdin
    #[arg(long)]
    pub event: String,
    /// Dispatch settings YAML file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Job service base URL (overrides the settings file)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Seconds between status queries (default 10)
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
    /// Give up after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
    /// Reported state that ends polling as a failure (repeatable)
    #[arg(long = "failure-state")]
    pub failure_states: Vec<String>,
    /// Read secrets from `<dir>/<name>.json` instead of the environment
    #[arg(long)]
    pub secrets_dir: Option<PathBuf>,
}

/// Merge the settings file (if any) with command-line overrides.
fn resolve_settings(args: &DispatchArgs) -> Result<DispatchSettings> {
    let mut settings = match (&args.config, &args.base_url) {
        (Some(path), _) => parser::parse_dispatch_settings(path)?,
        (None, Some(url)) => DispatchSettings::new(url.clone()),
        (None, None) => bail!("Either --config or --base-url is required"),
    };
    if let Some(ref url) = args.base_url {
        settings.base_url.clone_from(url);
    }
    if let Some(secs) = args.poll_interval_secs {
        settings = settings.with_poll_interval(Duration::from_secs(secs))?;
    }
    if let Some(secs) = args.deadline_secs {
        settings = settings.with_deadline(Some(Duration::from_secs(secs)));
    }
    if !args.failure_states.is_empty() {
        settings.failure_states.clone_from(&args.failure_states);
    }
    Ok(settings)
}

fn read_event(source: &str) -> Result<Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read event file: {source}"))?
    };
    serde_json::from_str(&raw).context("Event is not valid JSON")
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling dispatch...");
            token.cancel();
        }
    });
}

async fn dispatch_with<S: SecretStore>(
    event: &Value,
    secrets: &S,
    settings: DispatchSettings,
    cancel: &CancellationToken,
) -> Result<()> {
    let service = HttpJobService::new(&settings)?;
    let dispatcher = JobDispatcher::new(service, settings);
    let response = handle_dispatch_event(event, secrets, &dispatcher, cancel).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.status_code() != 200 {
        bail!("Job was submitted but no job run id was returned");
    }
    Ok(())
}

/// Execute the `dispatch` command: submit one job and wait for it to succeed.
pub async fn execute(args: DispatchArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;
    let event = read_event(&args.event)?;

    tracing::info!(
        base_url = settings.base_url,
        poll_interval_secs = settings.poll_interval().as_secs(),
        deadline_secs = settings.deadline().map(|d| d.as_secs()),
        "Dispatching job"
    );

    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    match args.secrets_dir {
        Some(dir) => dispatch_with(&event, &FileSecretStore::new(dir), settings, &cancel).await,
        None => dispatch_with(&event, &EnvSecretStore::default(), settings, &cancel).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DispatchArgs {
        DispatchArgs {
            event: "-".into(),
            config: None,
            base_url: None,
            poll_interval_secs: None,
            deadline_secs: None,
            failure_states: Vec::new(),
            secrets_dir: None,
        }
    }

    #[test]
    fn test_settings_require_config_or_base_url() {
        let err = resolve_settings(&args()).unwrap_err().to_string();
        assert!(err.contains("--base-url"));
    }

    #[test]
    fn test_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.yaml");
        std::fs::write(
            &path,
            "base_url: http://from-file\npoll_interval_secs: 30\nfailure_states: [ERROR]\n",
        )
        .unwrap();

        let settings = resolve_settings(&DispatchArgs {
            config: Some(path),
            base_url: Some("http://from-flag".into()),
            deadline_secs: Some(120),
            failure_states: vec!["FAILED".into()],
            ..args()
        })
        .unwrap();

        assert_eq!(settings.base_url, "http://from-flag");
        assert_eq!(settings.poll_interval(), Duration::from_secs(30));
        assert_eq!(settings.deadline(), Some(Duration::from_secs(120)));
        assert_eq!(settings.failure_states, vec!["FAILED"]);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = resolve_settings(&DispatchArgs {
            base_url: Some("http://x".into()),
            poll_interval_secs: Some(0),
            ..args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }

    #[test]
    fn test_event_file_must_be_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "group=G").unwrap();
        let err = read_event(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
