//! Named templates and their rendered output

use std::fmt;

use super::context::TemplateContext;
use super::engine::TemplateEngine;
use crate::Error;

/// A named resource template known at compile time.
///
/// The name labels log lines and errors; one template may render several
/// distinct resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceTemplate {
    /// Template identity
    pub name: &'static str,
    /// Template body with `${...}` placeholders
    pub body: &'static str,
}

impl ResourceTemplate {
    /// Create a template from a name and body
    pub const fn new(name: &'static str, body: &'static str) -> Self {
        Self { name, body }
    }

    /// Render this template into a concrete document
    pub fn render(
        &self,
        engine: &TemplateEngine,
        ctx: &TemplateContext,
    ) -> Result<RenderedResource, Error> {
        let document = engine
            .render_named(self.name, self.body, ctx)
            .map_err(|e| Error::template(self.name, e))?;
        Ok(RenderedResource {
            template: self.name,
            document,
        })
    }
}

impl fmt::Display for ResourceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A template body after substitution, handed whole to the cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedResource {
    /// Name of the template this document came from
    pub template: &'static str,
    /// The rendered YAML document
    pub document: String,
}
