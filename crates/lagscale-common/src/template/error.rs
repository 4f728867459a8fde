//! Template error types

use std::fmt;

use minijinja::ErrorKind;

/// Errors that can occur while rendering a resource template
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed
    Render(minijinja::Error),
    /// A placeholder references a field the parameters do not define
    Undefined(String),
    /// Parameters could not be turned into a rendering context
    Context(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Undefined(detail) => write!(f, "undefined placeholder: {}", detail),
            Self::Context(msg) => write!(f, "invalid template context: {}", msg),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl TemplateError {
    /// Undefined-placeholder error naming the `missing` fields, located by
    /// the line minijinja reports
    pub(crate) fn undefined(err: &minijinja::Error, missing: &[String]) -> Self {
        let fields = if missing.is_empty() {
            err.to_string()
        } else {
            missing.join(", ")
        };
        match err.line() {
            Some(line) => Self::Undefined(format!("{} at line {}", fields, line)),
            None => Self::Undefined(fields),
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        if err.kind() == ErrorKind::UndefinedError {
            Self::undefined(&err, &[])
        } else {
            Self::Render(err)
        }
    }
}
