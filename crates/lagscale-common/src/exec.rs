//! Command execution channel
//!
//! Runs opaque shell strings either inside a running pod (`kubectl exec`) or
//! in the local environment (cluster-admin tooling such as `helm`). Every
//! invocation carries a deadline: a process still running when it expires is
//! killed and reported as [`Error::CommandTimeout`], separate from a command
//! that ran and failed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Default deadline for a single command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured output of a command run inside a pod
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Trait abstracting command execution
///
/// Allows scenario logic to be tested without a cluster or a shell.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through `sh -c` inside `pod` in `namespace`
    async fn exec(&self, pod: &str, namespace: &str, command: &str) -> Result<ExecOutput, Error>;

    /// Run `command` through `sh -c` locally, returning stdout
    async fn exec_local(&self, command: &str) -> Result<String, Error>;
}

/// Real command runner backed by `sh` and `kubectl`
#[derive(Clone, Debug)]
pub struct ShellRunner {
    timeout: Duration,
    kubeconfig: Option<PathBuf>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ShellRunner {
    /// Create a runner with the given per-command deadline
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            kubeconfig: None,
        }
    }

    /// Pass `--kubeconfig` to every `kubectl exec`
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    fn kubectl_exec_args(&self, pod: &str, namespace: &str, command: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(10);
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args.extend(
            ["exec", "-n", namespace, pod, "--", "sh", "-c", command]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// Spawn `program` with `args`, wait for it under the deadline, and
    /// fail on non-zero exit.
    async fn run(&self, program: &str, args: &[String], label: &str) -> Result<ExecOutput, Error> {
        debug!(command = %label, timeout = ?self.timeout, "running command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                warn!(command = %label, timeout = ?self.timeout, "command timed out, killed");
                Error::command_timeout(label, self.timeout)
            })?
            .map_err(|e| Error::command_failed(label, format!("failed to execute: {}", e)))?;

        let result = ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(result)
        } else {
            let message = match output.status.code() {
                Some(code) => format!("exit status {}: {}", code, result.stderr.trim()),
                None => format!("terminated by signal: {}", result.stderr.trim()),
            };
            Err(Error::command_failed(label, message))
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn exec(&self, pod: &str, namespace: &str, command: &str) -> Result<ExecOutput, Error> {
        info!(pod = %pod, namespace = %namespace, command = %command, "exec in pod");
        let args = self.kubectl_exec_args(pod, namespace, command);
        self.run("kubectl", &args, command).await
    }

    async fn exec_local(&self, command: &str) -> Result<String, Error> {
        info!(command = %command, "exec local");
        let args = vec!["-c".to_string(), command.to_string()];
        self.run("sh", &args, command).await.map(|out| out.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_command_returns_stdout() {
        let runner = ShellRunner::new(Duration::from_secs(10));
        let out = runner.exec_local("echo hello").await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_local_command_failure_carries_stderr() {
        let runner = ShellRunner::new(Duration::from_secs(10));
        let err = runner
            .exec_local("echo 'no such release' >&2; exit 3")
            .await
            .unwrap_err();
        match err {
            Error::CommandFailed { message, .. } => {
                assert!(message.contains("exit status 3"));
                assert!(message.contains("no such release"));
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_hung_command() {
        let runner = ShellRunner::new(Duration::from_millis(200));
        let err = runner.exec_local("sleep 30").await.unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[test]
    fn test_kubectl_exec_args() {
        let runner = ShellRunner::default();
        let args = runner.kubectl_exec_args("kafka-test-client", "kafka-test-ns", "echo hi | cat");
        assert_eq!(
            args,
            vec![
                "exec",
                "-n",
                "kafka-test-ns",
                "kafka-test-client",
                "--",
                "sh",
                "-c",
                "echo hi | cat"
            ]
        );
    }

    #[test]
    fn test_kubectl_exec_args_with_kubeconfig() {
        let runner = ShellRunner::default().with_kubeconfig("/tmp/kc");
        let args = runner.kubectl_exec_args("p", "ns", "true");
        assert_eq!(&args[..2], &["--kubeconfig".to_string(), "/tmp/kc".to_string()]);
    }
}
