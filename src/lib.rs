//! Paginated, newest-first category listings served from a layered,
//! self-regenerating cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
