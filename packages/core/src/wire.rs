//! Structured error bodies shared by the router and the client stubs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{EnumSpec, RecordSpec, TypeSpec, WireType};

/// The JSON body returned for every error response.
///
/// ```json
/// { "kind": "unknown_enum_value", "message": "parameter `mode`: unknown value \"HALT\" for enumeration ShutdownMode" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error kind. See [`ErrorKind`].
    pub kind: String,

    /// Human-readable description of the problem.
    pub message: String,

    /// Diagnostic report for internal failures, to be fetched through the
    /// error-report endpoint. Never carries a stack trace itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ErrorReportRef>,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            report: None,
        }
    }

    pub fn with_report(mut self, report: ErrorReportRef) -> Self {
        self.report = Some(report);
        self
    }

    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::parse(&self.kind)
    }
}

/// Well-known error kinds.
pub mod kinds {
    pub const NOT_FOUND: &str = "not_found";
    pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const MISSING_FIELD: &str = "missing_field";
    pub const UNKNOWN_ENUM_VALUE: &str = "unknown_enum_value";
    pub const UNKNOWN_VARIANT: &str = "unknown_variant";
    pub const NOT_IMPLEMENTED: &str = "not_implemented";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const CANCELLED_WAIT: &str = "cancelled_wait";
}

/// A typed view of the `kind` string, so callers can branch without
/// comparing strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    MethodNotAllowed,
    BadRequest,
    MissingField,
    UnknownEnumValue,
    UnknownVariant,
    NotImplemented,
    Internal,
    /// A suspended long-poll whose client went away. Logged only.
    CancelledWait,
    /// A kind supplied by a domain controller.
    Domain(String),
}

impl ErrorKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            kinds::NOT_FOUND => ErrorKind::NotFound,
            kinds::METHOD_NOT_ALLOWED => ErrorKind::MethodNotAllowed,
            kinds::BAD_REQUEST => ErrorKind::BadRequest,
            kinds::MISSING_FIELD => ErrorKind::MissingField,
            kinds::UNKNOWN_ENUM_VALUE => ErrorKind::UnknownEnumValue,
            kinds::UNKNOWN_VARIANT => ErrorKind::UnknownVariant,
            kinds::NOT_IMPLEMENTED => ErrorKind::NotImplemented,
            kinds::INTERNAL_ERROR => ErrorKind::Internal,
            kinds::CANCELLED_WAIT => ErrorKind::CancelledWait,
            other => ErrorKind::Domain(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::NotFound => kinds::NOT_FOUND,
            ErrorKind::MethodNotAllowed => kinds::METHOD_NOT_ALLOWED,
            ErrorKind::BadRequest => kinds::BAD_REQUEST,
            ErrorKind::MissingField => kinds::MISSING_FIELD,
            ErrorKind::UnknownEnumValue => kinds::UNKNOWN_ENUM_VALUE,
            ErrorKind::UnknownVariant => kinds::UNKNOWN_VARIANT,
            ErrorKind::NotImplemented => kinds::NOT_IMPLEMENTED,
            ErrorKind::Internal => kinds::INTERNAL_ERROR,
            ErrorKind::CancelledWait => kinds::CANCELLED_WAIT,
            ErrorKind::Domain(kind) => kind,
        }
    }

    /// `true` for the marshalling failures that are reported as bad requests.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            ErrorKind::BadRequest
                | ErrorKind::MissingField
                | ErrorKind::UnknownEnumValue
                | ErrorKind::UnknownVariant
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error reports
// ---------------------------------------------------------------------------

/// Collection state of an error report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReportState {
    Incomplete,
    Done,
}

/// A reference to a diagnostic report produced by an internal failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReportRef {
    pub id: String,
    pub kind: String,
    pub state: ErrorReportState,
}

impl WireType for ErrorReportState {
    fn type_spec() -> TypeSpec {
        EnumSpec::new("ErrorReportState", ["INCOMPLETE", "DONE"]).into()
    }
}

impl WireType for ErrorReportRef {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("ErrorReportRef")
            .field::<String>("id")
            .field::<String>("kind")
            .field::<ErrorReportState>("state")
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal;

    #[test]
    fn kinds_roundtrip_through_strings() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::MethodNotAllowed,
            ErrorKind::MissingField,
            ErrorKind::UnknownVariant,
            ErrorKind::Domain("disk_too_small".into()),
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn error_response_omits_absent_report() {
        let body = ErrorResponse::new(kinds::NOT_FOUND, "no endpoint at /nope");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "not_found", "message": "no endpoint at /nope" }));
        assert_eq!(body.error_kind(), ErrorKind::NotFound);
    }

    #[test]
    fn report_ref_matches_its_type_spec() {
        let report = ErrorReportRef {
            id: "3".into(),
            kind: "internal_error".into(),
            state: ErrorReportState::Done,
        };
        let wire = marshal::encode(&ErrorReportRef::type_spec(), &report).unwrap();
        assert_eq!(wire["state"], "DONE");
        let back: ErrorReportRef = marshal::decode(&ErrorReportRef::type_spec(), wire).unwrap();
        assert_eq!(back, report);
    }
}
