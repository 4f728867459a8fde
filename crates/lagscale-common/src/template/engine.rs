//! Template engine with `${...}` placeholder syntax
//!
//! Uses minijinja with custom syntax configuration:
//! - Variable delimiters: `${...}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//! - Escape: `$${...}` produces literal `${...}`
//!
//! YAML bodies use `{}` and `{{` freely, so the default Jinja delimiters
//! would collide with document content.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};

use super::context::TemplateContext;
use super::error::TemplateError;

/// Placeholder for escaped `$${` during preprocessing
const ESCAPED_PLACEHOLDER: &str = "\x00__LAGSCALE_ESCAPED_DOLLAR_BRACE__\x00";

/// Template engine for resource documents
///
/// Rendering is strict: a placeholder naming a field the context does not
/// define is an error, while an empty field renders as an empty string.
/// Text outside placeholders, including the trailing newline, is kept as is.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    ///
    /// # Panics
    ///
    /// Panics if the minijinja syntax configuration fails to build, which
    /// only happens if the hardcoded delimiters stop being accepted.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        Self { env }
    }

    /// Render an anonymous template string with the given context
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        self.render_named("<string>", template, ctx)
    }

    /// Render a template string, reporting errors under `name`
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Undefined` naming every placeholder the
    /// context lacks, and `TemplateError::Render` for syntax errors.
    pub fn render_named(
        &self,
        name: &str,
        template: &str,
        ctx: &TemplateContext,
    ) -> Result<String, TemplateError> {
        let preprocessed = template.replace("$${", ESCAPED_PLACEHOLDER);

        let compiled = self
            .env
            .template_from_named_str(name, &preprocessed)
            .map_err(TemplateError::from)?;
        let rendered = compiled.render(ctx.to_value()).map_err(|e| {
            if e.kind() != ErrorKind::UndefinedError {
                return TemplateError::from(e);
            }
            let mut missing: Vec<String> = compiled
                .undeclared_variables(false)
                .into_iter()
                .filter(|field| !ctx.contains(field))
                .collect();
            missing.sort();
            TemplateError::undefined(&e, &missing)
        })?;

        Ok(rendered.replace(ESCAPED_PLACEHOLDER, "${"))
    }
}
