use anyhow::Error as AnyError;
use serde::Serialize;
use thiserror::Error;

use crate::body::Body;
use crate::http::{Method, Response, StatusCode};
use crate::response::{IntoResponse, JsonBody};

/// Failure raised by a handler or the plumbing around it, mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("{message}")]
    BadRequest { message: String },
    #[error("not found: {what}")]
    NotFound { what: String },
    #[error("method {method} not allowed; allowed: {allowed}")]
    MethodNotAllowed { method: Method, allowed: String },
    #[error("internal error: {source}")]
    Internal {
        #[from]
        source: AnyError,
    },
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    status: u16,
    message: &'a str,
}

impl EdgeError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// `allowed` is reported sorted, or as `(none)` when empty.
    pub fn method_not_allowed(method: &Method, allowed: &[Method]) -> Self {
        let mut names: Vec<&str> = allowed.iter().map(Method::as_str).collect();
        names.sort_unstable();
        let allowed = match names.as_slice() {
            [] => "(none)".to_string(),
            names => names.join(", "),
        };
        Self::MethodNotAllowed {
            method: method.clone(),
            allowed,
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<AnyError>,
    {
        Self::Internal {
            source: error.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        let envelope = ErrorEnvelope {
            error: ErrorDetail {
                status: status.as_u16(),
                message: &message,
            },
        };
        let body = Body::json(&envelope).unwrap_or_else(|_| Body::text("internal error"));

        let mut response = JsonBody(body).into_response();
        *response.status_mut() = status;
        response
    }
}
