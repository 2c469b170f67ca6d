//! Application services layer: the listing engine.

pub mod engine;
pub mod error;
pub mod hooks;
pub mod invalidator;
pub mod jobs;
pub mod listing;
pub mod materializer;
pub mod pagination;
pub mod providers;
pub mod repos;
pub mod resolver;
pub mod transitions;
