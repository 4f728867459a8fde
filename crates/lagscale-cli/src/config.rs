//! Run configuration
//!
//! Flags come from clap, each with an environment fallback. The env file is
//! loaded before flags are parsed so its values reach those fallbacks:
//!
//! 1. Explicit flag
//! 2. Process environment
//! 3. Env file (`--env-file`, default `.env`; a missing default is fine)
//! 4. Built-in default

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tracing::debug;

use lagscale_common::exec::DEFAULT_COMMAND_TIMEOUT;

use crate::kafka::DEFAULT_STRIMZI_VERSION;
use crate::runner::RunnerOptions;
use crate::scenarios;
use crate::{Error, Result};

/// Env file read when `--env-file` is not given
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Flags of `lagscale run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Kubeconfig to use instead of the inferred configuration
    #[arg(long, env = "LAGSCALE_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Suffix appended to the test name so runs can share a cluster
    #[arg(long, env = "LAGSCALE_NAMESPACE_SUFFIX")]
    pub namespace_suffix: Option<String>,

    /// Run only the named scenario (repeatable)
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Deadline of every command in seconds
    #[arg(
        long,
        env = "LAGSCALE_COMMAND_TIMEOUT_SECS",
        default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs()
    )]
    pub command_timeout_secs: u64,

    /// Strimzi operator chart version
    #[arg(long, env = "STRIMZI_OPERATOR_VERSION", default_value = DEFAULT_STRIMZI_VERSION)]
    pub strimzi_version: String,

    /// Leave the test namespace in place after teardown
    #[arg(long)]
    pub keep_namespace: bool,
}

/// Validated configuration of a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Explicit kubeconfig, if any
    pub kubeconfig: Option<PathBuf>,
    /// Namespace suffix, if any
    pub namespace_suffix: Option<String>,
    /// Scenario filter; empty runs everything
    pub scenarios: Vec<String>,
    /// Deadline of every command
    pub command_timeout: Duration,
    /// Strimzi operator chart version
    pub strimzi_version: String,
    /// Leave the namespace in place
    pub keep_namespace: bool,
}

impl RunConfig {
    /// Validate parsed flags
    pub fn from_args(args: RunArgs) -> Result<Self> {
        for name in &args.scenarios {
            if !scenarios::NAMES.contains(&name.as_str()) {
                return Err(Error::config(format!(
                    "unknown scenario '{}', expected one of: {}",
                    name,
                    scenarios::NAMES.join(", ")
                )));
            }
        }

        let namespace_suffix = args.namespace_suffix.filter(|s| !s.is_empty());
        if let Some(suffix) = &namespace_suffix {
            validate_suffix(suffix)?;
        }

        if args.command_timeout_secs == 0 {
            return Err(Error::config("command timeout must be at least 1 second"));
        }
        if args.strimzi_version.trim().is_empty() {
            return Err(Error::config("strimzi version must not be empty"));
        }

        Ok(Self {
            kubeconfig: args.kubeconfig,
            namespace_suffix,
            scenarios: args.scenarios,
            command_timeout: Duration::from_secs(args.command_timeout_secs),
            strimzi_version: args.strimzi_version,
            keep_namespace: args.keep_namespace,
        })
    }

    /// Runner options for this configuration
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            strimzi_version: self.strimzi_version.clone(),
            keep_namespace: self.keep_namespace,
            ..Default::default()
        }
    }
}

/// The suffix ends up in every resource name, so it must keep the longest
/// derived name (`<test>-<suffix>-deployment`) a valid DNS label.
fn validate_suffix(suffix: &str) -> Result<()> {
    const MAX_SUFFIX_LEN: usize = 30;

    let valid_chars = suffix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || suffix.starts_with('-') || suffix.ends_with('-') {
        return Err(Error::config(format!(
            "namespace suffix '{}' must be lowercase alphanumerics and '-', not starting or ending with '-'",
            suffix
        )));
    }
    if suffix.len() > MAX_SUFFIX_LEN {
        return Err(Error::config(format!(
            "namespace suffix '{}' is longer than {} characters",
            suffix, MAX_SUFFIX_LEN
        )));
    }
    Ok(())
}

/// Find `--env-file` in raw arguments, before clap runs.
///
/// Returns the path and whether it was given explicitly.
pub fn env_file_from_args<I>(args: I) -> (PathBuf, bool)
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        if arg == "--env-file" {
            if let Some(path) = args.next() {
                return (PathBuf::from(path), true);
            }
        } else if let Some(path) = arg.to_str().and_then(|a| a.strip_prefix("--env-file=")) {
            return (PathBuf::from(path), true);
        }
    }
    (PathBuf::from(DEFAULT_ENV_FILE), false)
}

/// Load `path` into the process environment without overriding variables
/// that are already set.
///
/// A missing file is an error only when it was asked for explicitly.
/// Returns whether a file was loaded.
pub fn load_env_file(path: &Path, explicit: bool) -> Result<bool> {
    if !path.exists() {
        if explicit {
            return Err(Error::config(format!(
                "env file {} does not exist",
                path.display()
            )));
        }
        return Ok(false);
    }
    dotenvy::from_path(path).map_err(|e| {
        Error::config(format!("failed to load env file {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "loaded env file");
    Ok(true)
}
