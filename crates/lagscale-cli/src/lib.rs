//! lagscale CLI library
//!
//! End-to-end scenarios for KEDA's Kafka consumer-lag scaler: installs a
//! Strimzi Kafka cluster, drives producers and consumers, and checks the
//! replica counts the scaler produces.

pub mod config;
pub mod error;
pub mod kafka;
pub mod manifests;
pub mod params;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod scenarios;

pub use error::{Error, Result};

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use lagscale_common::exec::ShellRunner;
use lagscale_common::kube_utils::{self, KubeCluster};
use lagscale_common::retry::{retry_with_backoff, RetryConfig};
use lagscale_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};

use crate::config::{RunArgs, RunConfig, DEFAULT_ENV_FILE};
use crate::params::BaseNames;
use crate::runner::Runner;

/// lagscale - KEDA Kafka scaler end-to-end scenarios
#[derive(Parser, Debug)]
#[command(name = "lagscale")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Env file loaded before flags are resolved
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Log output format (text or json)
    #[arg(long, global = true, env = "LAGSCALE_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up Kafka, run the scenarios and tear everything down
    Run(RunArgs),
    /// List the scenarios
    List,
}

impl Cli {
    /// Install the global log subscriber in the requested format
    pub fn init_logging(&self) -> Result<()> {
        init_telemetry(TelemetryConfig {
            format: self.log_format,
            ..Default::default()
        })?;
        Ok(())
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => run(RunConfig::from_args(args)?).await,
            Commands::List => {
                for scenario in scenarios::all(&BaseNames::default()) {
                    println!("{:<24} {}", scenario.name, scenario.description);
                }
                Ok(())
            }
        }
    }
}

async fn run(config: RunConfig) -> Result<()> {
    let names = BaseNames::new(config.namespace_suffix.as_deref());
    let selected = scenarios::select(scenarios::all(&names), &config.scenarios);
    info!(
        namespace = %names.namespace,
        scenarios = selected.len(),
        command_timeout_secs = config.command_timeout.as_secs(),
        "starting run"
    );

    let kubeconfig = config.kubeconfig.as_deref();
    let client = retry_with_backoff(
        &RetryConfig::with_max_attempts(5),
        "create_kube_client",
        || kube_utils::create_client(kubeconfig),
    )
    .await?;

    let mut commands = ShellRunner::new(config.command_timeout);
    if let Some(path) = &config.kubeconfig {
        commands = commands.with_kubeconfig(path);
    }

    let mut runner = Runner::new(
        names,
        Arc::new(KubeCluster::new(client)),
        Arc::new(commands),
        config.runner_options(),
    );
    let report = runner.run(&selected).await;
    println!("{}", report);

    if report.is_success() {
        Ok(())
    } else {
        Err(Error::RunFailed {
            failed: report.failed_count(),
            total: report.scenarios.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "lagscale",
            "--log-format",
            "json",
            "run",
            "--scenario",
            "earliest-policy",
            "--scenario",
            "multi-topic",
            "--namespace-suffix",
            "ci",
            "--keep-namespace",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenarios, vec!["earliest-policy", "multi-topic"]);
                assert_eq!(args.namespace_suffix.as_deref(), Some("ci"));
                assert!(args.keep_namespace);
            }
            Commands::List => panic!("Expected run"),
        }
    }

    #[test]
    fn test_bad_log_format_rejected() {
        assert!(Cli::try_parse_from(["lagscale", "--log-format", "xml", "list"]).is_err());
    }
}
