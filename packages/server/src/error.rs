//! Application-level error type produced while dispatching a request.
//!
//! All variants serialise to [`ErrorResponse`] JSON and map to the HTTP
//! status for their kind:
//!
//! | Variant | Status |
//! |---------|--------|
//! | `NotFound` | 404 |
//! | `MethodNotAllowed` | 405 (with an `Allow` header) |
//! | `BadRequest` | 400 |
//! | `Domain` | 422 |
//! | `NotImplemented` | 501 |
//! | `Internal` | 500 |

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use keel::{
    kinds, ErrorKind, ErrorReportRef, ErrorResponse, MarshalError, Method, RouteError, SchemaError,
};

use crate::handlers::BindError;

/// Why the server could not be assembled.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid bindings: {0}")]
    Bind(#[from] BindError),
}

/// An error that dispatch can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    MethodNotAllowed { message: String, allowed: Vec<Method> },
    /// An argument failed to decode. `kind` is one of the marshalling kinds.
    BadRequest { kind: ErrorKind, message: String },
    /// A failure reported by a domain controller under its own kind.
    Domain { kind: String, message: String },
    NotImplemented(String),
    Internal {
        message: String,
        report: Option<ErrorReportRef>,
    },
}

impl AppError {
    /// A marshalling failure for the named parameter.
    pub fn argument(param: &str, err: &MarshalError) -> Self {
        AppError::BadRequest {
            kind: err.kind(),
            message: format!("parameter `{param}`: {err}"),
        }
    }

    pub fn missing(param: &str) -> Self {
        AppError::BadRequest {
            kind: ErrorKind::MissingField,
            message: format!("missing required parameter `{param}`"),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Domain { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut allow = None;
        let body = match self {
            AppError::NotFound(msg) => ErrorResponse::new(kinds::NOT_FOUND, msg),
            AppError::MethodNotAllowed { message, allowed } => {
                let list: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                allow = HeaderValue::from_str(&list.join(", ")).ok();
                ErrorResponse::new(kinds::METHOD_NOT_ALLOWED, message)
            }
            AppError::BadRequest { kind, message } => ErrorResponse::new(kind.as_str(), message),
            AppError::Domain { kind, message } => ErrorResponse::new(kind, message),
            AppError::NotImplemented(msg) => ErrorResponse::new(kinds::NOT_IMPLEMENTED, msg),
            AppError::Internal { message, report } => {
                let body = ErrorResponse::new(kinds::INTERNAL_ERROR, message);
                match report {
                    Some(report) => body.with_report(report),
                    None => body,
                }
            }
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(allow) = allow {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}

impl From<RouteError> for AppError {
    fn from(e: RouteError) -> Self {
        let message = e.to_string();
        match e {
            RouteError::NotFound { .. } => AppError::NotFound(message),
            RouteError::MethodNotAllowed { allowed, .. } => {
                AppError::MethodNotAllowed { message, allowed }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_keep_their_marshal_kind() {
        let err = MarshalError::UnknownEnumValue {
            name: "ShutdownMode".into(),
            value: "HALT".into(),
        };
        let app = AppError::argument("mode", &err);
        assert_eq!(app.status(), StatusCode::BAD_REQUEST);
        match app {
            AppError::BadRequest { kind, message } => {
                assert_eq!(kind, ErrorKind::UnknownEnumValue);
                assert!(message.starts_with("parameter `mode`"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let err = AppError::from(RouteError::MethodNotAllowed {
            method: Method::Delete,
            path: "/locale".into(),
            allowed: vec![Method::Get, Method::Post],
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, POST");
    }

    #[test]
    fn domain_errors_are_unprocessable() {
        let err = AppError::Domain {
            kind: "disk_too_small".into(),
            message: "the disk is too small".into(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
