use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{jobs::QueueError, transitions::TransitionError},
    cache::CacheError,
    domain::slug::SlugError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("invalid category slug: {0}")]
    Slug(#[from] SlugError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Slug(_) => StatusCode::BAD_REQUEST,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Cache(CacheError::Unavailable(_))
            | AppError::Queue(QueueError::Unavailable(_))
            | AppError::Transition(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Cache(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Slug(_) => "Request could not be processed",
            AppError::Infra(InfraError::Database { .. }) | AppError::Transition(_) => {
                "Service temporarily unavailable"
            }
            AppError::Cache(_) => "Cache backend failure",
            AppError::Queue(_) => "Job queue unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Infra(InfraError::Admin(_)) => "Admin listener request failed",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request_with_report() {
        let response = AppError::from(SlugError::EmptyInput).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert!(report.messages[0].contains("category slug is empty"));
    }

    #[test]
    fn unavailable_backends_map_to_503() {
        let response = AppError::from(CacheError::unavailable("down")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let response = AppError::from(QueueError::Unavailable("closed".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
