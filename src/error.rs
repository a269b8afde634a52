//! Request-level failure taxonomy.
//!
//! Handlers return [`AppError`] for every outcome that is not a normal
//! rendered view. Converting one into a response only records an
//! [`ErrorReport`] in the response extensions; the global error renderer in
//! [`server`](crate::server) turns that into HTML in the shape negotiated for
//! the request, so success and failure paths pick fragment-vs-page the same
//! way.
//!
//! Contact-form validation failures are not errors here: they re-render the
//! form with a 400 status directly from the handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::validate::FieldErrors;

pub const NOT_FOUND_MESSAGE: &str = "The requested contact could not be found. It may have been deleted.";
pub const ACCESS_DENIED_MESSAGE: &str =
    "This address can only be requested from within the contacts page.";
pub const INTERNAL_MESSAGE: &str = "Something went wrong while handling your request.";
pub const BAD_REQUEST_MESSAGE: &str = "The request could not be understood by the server.";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "This method is not allowed for the requested address.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("request did not come from the fragment client")]
    AccessDenied,

    #[error("invalid query parameters")]
    Validation(FieldErrors),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// What the error renderer needs to know about a failed request.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    /// Report for an error status produced outside [`AppError`], such as an
    /// extractor rejection or the router's method check.
    pub fn from_status(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::NOT_FOUND => NOT_FOUND_MESSAGE,
            StatusCode::FORBIDDEN => ACCESS_DENIED_MESSAGE,
            StatusCode::METHOD_NOT_ALLOWED => METHOD_NOT_ALLOWED_MESSAGE,
            s if s.is_client_error() => BAD_REQUEST_MESSAGE,
            _ => INTERNAL_MESSAGE,
        };
        Self {
            status,
            messages: vec![message.to_string()],
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let messages = match self {
            AppError::NotFound => vec![NOT_FOUND_MESSAGE.to_string()],
            AppError::AccessDenied => vec![ACCESS_DENIED_MESSAGE.to_string()],
            AppError::Validation(errors) => errors.messages(),
            AppError::Internal(_) => vec![INTERNAL_MESSAGE.to_string()],
        };
        ErrorReport {
            status: self.status(),
            messages,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(err) => tracing::error!(error = ?err, "request failed"),
            AppError::AccessDenied => tracing::warn!("rejected request without HX-Request header"),
            _ => tracing::debug!(error = %self, "request ended with client error"),
        }

        let report = self.report();
        let mut response = (report.status, report.messages.join("\n")).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
