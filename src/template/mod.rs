//! Template module for Courier.
//!
//! This module provides:
//! - The registry of named file-based templates from configuration
//! - Handlebars rendering with empty substitution for unknown placeholders
//! - The markdown > html > text body source precedence

mod renderer;

pub use renderer::Renderer;

use std::collections::HashMap;

use crate::config::TemplateFilesConfig;
use crate::{CourierError, Result};

/// The kind of body a template source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Markdown body.
    Markdown,
    /// HTML body.
    Html,
    /// Plain-text body.
    Text,
}

impl BodyKind {
    /// Database/wire name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Markdown => "markdown",
            BodyKind::Html => "html",
            BodyKind::Text => "text",
        }
    }

    /// Parse a database/wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "markdown" => Some(BodyKind::Markdown),
            "html" => Some(BodyKind::Html),
            "text" => Some(BodyKind::Text),
            _ => None,
        }
    }
}

/// Registry of named file-based templates.
///
/// Built from the `[templates.<name>]` config sections, which are validated
/// at startup to carry at least one source each.
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateFilesConfig>,
}

impl TemplateRegistry {
    /// Create a registry from the configured template map.
    pub fn from_config(templates: HashMap<String, TemplateFilesConfig>) -> Self {
        Self { templates }
    }

    /// Create an empty registry (no named templates).
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Whether a template with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Load the body source for a named template.
    ///
    /// Selects exactly one source by markdown > html > text precedence and
    /// reads its file. An unregistered name is `UnknownTemplate`; a missing
    /// file is a fatal I/O error.
    pub async fn load(&self, name: &str) -> Result<(BodyKind, String)> {
        let files = self
            .templates
            .get(name)
            .ok_or_else(|| CourierError::UnknownTemplate(name.to_string()))?;

        let (kind, path) = if let Some(path) = &files.markdown {
            (BodyKind::Markdown, path)
        } else if let Some(path) = &files.html {
            (BodyKind::Html, path)
        } else if let Some(path) = &files.text {
            (BodyKind::Text, path)
        } else {
            // Guarded against by config validation
            return Err(CourierError::EmptyBody);
        };

        let content = tokio::fs::read_to_string(path).await?;
        Ok((kind, content))
    }
}
