//! Errors surfaced by generated stubs.

use keel::{ErrorKind, ErrorReportRef, MarshalError, Method};

use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a structured error body.
    #[error("{status} {kind}: {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
        report: Option<ErrorReportRef>,
    },

    /// The server answered with an error status and no structured body.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16, body: String },

    /// An argument did not match its declared type. Nothing was sent.
    #[error("argument `{param}`: {source}")]
    Marshal {
        param: String,
        #[source]
        source: MarshalError,
    },

    #[error("no endpoint {method} {path}")]
    UnknownEndpoint { method: Method, path: String },

    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("{method} {path} has no parameter `{param}`")]
    UnknownArgument {
        method: Method,
        path: String,
        param: String,
    },

    /// The response body did not match the declared return type.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// The typed error kind, for errors that have one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api { kind, .. } => Some(ErrorKind::parse(kind)),
            ClientError::Marshal { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// The error report attached to an internal server failure.
    pub fn report(&self) -> Option<&ErrorReportRef> {
        match self {
            ClientError::Api { report, .. } => report.as_ref(),
            _ => None,
        }
    }

    /// A message suitable for showing to a person. Transport failures get a
    /// generic message rather than connection internals.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Transport(TransportError::Timeout) => {
                "the server did not answer in time".to_string()
            }
            ClientError::Transport(_) => "could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_expose_their_kind() {
        let err = ClientError::Api {
            status: 422,
            kind: "disk_too_small".into(),
            message: "the disk is too small".into(),
            report: None,
        };
        assert_eq!(err.kind(), Some(ErrorKind::Domain("disk_too_small".into())));
        assert_eq!(err.user_message(), "the disk is too small");
    }

    #[test]
    fn transport_errors_get_a_generic_message() {
        let err = ClientError::from(TransportError::Connect("tcp connect error: refused".into()));
        assert_eq!(err.kind(), None);
        assert_eq!(err.user_message(), "could not reach the server");
    }
}
