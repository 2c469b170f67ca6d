//! Presentation layer: listing fragment markup.

pub mod views;

pub use views::{FragmentRenderer, LinkItem, Section, TemplateRenderError, TemplateRenderer};
