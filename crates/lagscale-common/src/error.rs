//! Error types for lagscale
//!
//! Errors are structured with fields so a failed scenario step can be traced
//! back to the resource, command or condition that caused it.

use std::time::Duration;

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for lagscale operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A resource template could not be rendered
    #[error("template {template} failed to render: {source}")]
    Template {
        /// Name of the template being rendered
        template: String,
        /// The underlying rendering error
        #[source]
        source: TemplateError,
    },

    /// The API server rejected an applied document
    #[error("apply of {kind}/{name} failed: {message}")]
    Apply {
        /// Resource kind from the document
        kind: String,
        /// Resource name from the document
        name: String,
        /// Description of what failed
        message: String,
    },

    /// The API server rejected a delete
    #[error("delete of {kind}/{name} failed: {message}")]
    Delete {
        /// Resource kind from the document
        kind: String,
        /// Resource name from the document
        name: String,
        /// Description of what failed
        message: String,
    },

    /// A command exited unsuccessfully or could not be spawned
    #[error("command `{command}` failed: {message}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// A command did not finish before its deadline and was killed
    #[error("command `{command}` timed out after {timeout:?}")]
    CommandTimeout {
        /// The command line that was run
        command: String,
        /// The deadline that expired
        timeout: Duration,
    },

    /// A resource condition was not reached in time
    #[error("timed out after {timeout:?} waiting for {target}")]
    ConditionTimeout {
        /// Human readable description of the awaited condition
        target: String,
        /// The timeout that expired
        timeout: Duration,
    },

    /// A rendered document is not usable YAML
    #[error("yaml error: {message}")]
    Yaml {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error occurred (e.g. "create_client", "replicas")
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Wrap a template error with the name of the template it came from
    pub fn template(template: impl Into<String>, source: TemplateError) -> Self {
        Self::Template {
            template: template.into(),
            source,
        }
    }

    /// Create an apply error for a resource
    pub fn apply(kind: impl Into<String>, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Apply {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a delete error for a resource
    pub fn delete(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Delete {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a command failure
    pub fn command_failed(command: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: msg.into(),
        }
    }

    /// Create a command timeout
    pub fn command_timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout,
        }
    }

    /// Create a condition timeout
    pub fn condition_timeout(target: impl Into<String>, timeout: Duration) -> Self {
        Self::ConditionTimeout {
            target: target.into(),
            timeout,
        }
    }

    /// Create a YAML error
    pub fn yaml(msg: impl Into<String>) -> Self {
        Self::Yaml {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Whether this error came from a command execution (failure or timeout)
    pub fn is_command_error(&self) -> bool {
        matches!(self, Self::CommandFailed { .. } | Self::CommandTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: a hung producer is reported as a timeout, not as a failure
    ///
    /// Callers need to tell "the command ran and failed" apart from "the
    /// command never finished", since only the latter points at a stuck pod.
    #[test]
    fn story_command_timeout_is_distinct_from_failure() {
        let failed = Error::command_failed("kafka-console-producer", "broker not available");
        let timed_out = Error::command_timeout("kafka-console-producer", Duration::from_secs(30));

        assert!(failed.to_string().contains("broker not available"));
        assert!(timed_out.to_string().contains("timed out after 30s"));
        assert!(failed.is_command_error());
        assert!(timed_out.is_command_error());

        match timed_out {
            Error::CommandTimeout { timeout, .. } => assert_eq!(timeout, Duration::from_secs(30)),
            _ => panic!("Expected CommandTimeout variant"),
        }
    }

    /// Story: apply and delete errors name the resource they were about
    #[test]
    fn story_lifecycle_errors_name_the_resource() {
        let err = Error::apply("ScaledObject", "kafka-test-so", "admission webhook denied");
        assert_eq!(
            err.to_string(),
            "apply of ScaledObject/kafka-test-so failed: admission webhook denied"
        );

        let err = Error::delete("Deployment", "kafka-test-deployment", "forbidden");
        assert!(err.to_string().contains("Deployment/kafka-test-deployment"));
        assert!(!err.is_command_error());
    }

    /// Story: template errors carry the template name for diagnosis
    #[test]
    fn story_template_error_names_template() {
        let err = Error::template(
            "singleScaledObjectTemplate",
            TemplateError::Undefined("topic_nme".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("singleScaledObjectTemplate"));
        assert!(msg.contains("topic_nme"));
    }

    #[test]
    fn story_condition_timeout_message() {
        let err = Error::condition_timeout("kafka/kafka-test-kafka Ready", Duration::from_secs(300));
        assert!(err.to_string().contains("kafka/kafka-test-kafka Ready"));
    }
}
