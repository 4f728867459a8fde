//! Common building blocks for lagscale: errors, templating, cluster access,
//! command execution and condition polling

#![deny(missing_docs)]

pub mod error;
pub mod exec;
pub mod kube_utils;
pub mod lifecycle;
pub mod poll;
pub mod retry;
pub mod telemetry;
pub mod template;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
