//! deploywatch — watch Deployment rollouts from the command line.
//!
//! # Usage
//!
//! ```text
//! deploywatch watch web api --namespace shop --tolerance dynamic
//! deploywatch watch --config deploywatch.toml
//! ```
//!
//! Exits with status 0 only when every watched rollout succeeded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deploywatch",
    about = "Watch Deployment rollouts until they succeed, fail, or time out",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch one or more Deployments until their rollouts finish.
    ///
    /// Workloads named on the command line are added to those listed in
    /// the config file.
    Watch {
        /// Deployment names.
        names: Vec<String>,
        /// Path to deploywatch.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        namespace: Option<String>,
        #[arg(long)]
        context: Option<String>,
        /// kubectl binary to run.
        #[arg(long)]
        kubectl: Option<String>,
        /// Partial-success tolerance for named workloads:
        /// strict, dynamic, or a replica count.
        #[arg(short, long, default_value = "strict")]
        tolerance: String,
        /// Replica-set timeout, e.g. 7m.
        #[arg(long)]
        timeout: Option<String>,
        /// Polling interval, e.g. 3s.
        #[arg(long)]
        poll_interval: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,deploywatch=debug".parse().unwrap_or_default()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            names,
            config,
            namespace,
            context,
            kubectl,
            tolerance,
            timeout,
            poll_interval,
            format,
        } => {
            let args = commands::watch::WatchArgs {
                names,
                config,
                namespace,
                context,
                kubectl,
                tolerance,
                timeout,
                poll_interval,
                format,
            };
            let all_succeeded = commands::watch::run(args).await?;
            Ok(if all_succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
