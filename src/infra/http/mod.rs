mod admin;
mod middleware;
mod public;

pub use admin::{FlushResponse, build_admin_router};
pub use public::build_router;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlx::Error as SqlxError;

use crate::application::engine::ListingEngine;
use crate::application::error::ErrorReport;
use crate::domain::slug::{SlugError, parse_category_slug};
use crate::infra::db::PostgresRepositories;

/// Shared by the public and admin routers.
#[derive(Clone)]
pub struct HttpState {
    pub engine: ListingEngine,
    pub db: Option<Arc<PostgresRepositories>>,
}

impl HttpState {
    pub fn new(engine: ListingEngine) -> Self {
        Self { engine, db: None }
    }

    pub fn with_db(mut self, db: Arc<PostgresRepositories>) -> Self {
        self.db = Some(db);
        self
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn category_slug(raw: &str) -> Result<String, SlugError> {
    parse_category_slug(raw)
}
