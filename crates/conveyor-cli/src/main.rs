mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "conveyor",
    version,
    about = "Extract-transform-load pipelines and remote job dispatch"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline: extract, transform, load
    Run {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Validate pipeline configuration and stage parameters
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Submit a job to the execution service and wait for it to finish
    Dispatch(commands::dispatch::DispatchArgs),
    /// List available stages
    Stages {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { pipeline } => commands::run::execute(&pipeline).await,
        Commands::Check { pipeline } => commands::check::execute(&pipeline),
        Commands::Dispatch(args) => commands::dispatch::execute(args).await,
        Commands::Stages { json } => commands::stages::execute(json),
    }
}
