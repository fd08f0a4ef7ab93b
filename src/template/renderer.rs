//! Template renderer for Courier.

use handlebars::Handlebars;
use serde_json::Value;

use crate::Result;

/// Handlebars-backed template renderer.
///
/// Rendering is a pure function of the source and context: unresolved
/// placeholders render as empty strings, and only malformed template syntax
/// fails.
pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Renderer {
    /// Create a new renderer.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Unknown placeholders must render empty, never error
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Compile `source` as a template and substitute `context` values.
    pub fn render(&self, source: &str, context: &Value) -> Result<String> {
        Ok(self.handlebars.render_template(source, context)?)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
