//! Fragment rendering.
//!
//! One code path produces listing markup, whether for a live request or a
//! cache warm, so cached fragments always match what would be rendered now.

use askama::{Error as AskamaError, Template};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_EMPTY_MESSAGE: &str = "Nothing has been published here yet.";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }

    pub fn origin(&self) -> &'static str {
        self.source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkItem {
    pub label: String,
    pub link: String,
}

impl LinkItem {
    pub fn new(label: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            link: link.into(),
        }
    }
}

/// A titled group of links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub label: String,
    pub css_classes: String,
    pub items: Vec<LinkItem>,
}

/// Pure transform from sections to markup. An empty section list renders
/// the "no content" placeholder.
pub trait FragmentRenderer: Send + Sync {
    fn render(&self, sections: &[Section]) -> Result<String, TemplateRenderError>;
}

#[derive(Template)]
#[template(path = "fragment.html")]
struct FragmentTemplate<'a> {
    sections: &'a [Section],
    empty_message: &'a str,
}

/// Askama-backed renderer.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    empty_message: String,
}

impl TemplateRenderer {
    pub fn new(empty_message: impl Into<String>) -> Self {
        Self {
            empty_message: empty_message.into(),
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_EMPTY_MESSAGE)
    }
}

impl FragmentRenderer for TemplateRenderer {
    fn render(&self, sections: &[Section]) -> Result<String, TemplateRenderError> {
        FragmentTemplate {
            sections,
            empty_message: &self.empty_message,
        }
        .render()
        .map_err(|err| {
            TemplateRenderError::new(
                "presentation::views::TemplateRenderer::render",
                "Fragment rendering failed",
                err,
            )
        })
    }
}
