//! The two-tier error model.
//!
//! Every error crossing a stage boundary is either a *trusted* [`AppError`]
//! carrying an explicit [`ErrCode`], or an untrusted cause wrapped into an
//! `Internal`-coded [`AppError`]. Trusted errors are safe to summarize to the
//! client; untrusted ones are only ever logged.
//!
//! [`Error`] is the full set of outcomes a stage can return: an application
//! error, or the graceful-shutdown signal that must reach the caller's
//! top-level loop unchanged.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// The closed set of error classifications.
///
/// Each code maps to exactly one transport status via [`ErrCode::http_status`].
/// The table is fixed; adding a code without a mapping is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrCode {
    /// The operation was successful.
    Ok,
    /// The operation was successful with no content to return.
    NoContent,
    /// The operation created a new resource.
    Created,
    /// The operation was canceled, typically by the caller.
    Canceled,
    /// An error of unknown provenance.
    Unknown,
    /// The client specified an invalid argument.
    InvalidArgument,
    /// The operation expired before completion.
    DeadlineExceeded,
    /// A requested entity was not found.
    NotFound,
    /// An entity the client attempted to create already exists.
    AlreadyExists,
    /// The caller does not have permission for the operation.
    PermissionDenied,
    /// A per-caller resource quota was exhausted.
    ResourceExhausted,
    /// The system is not in a state required for the operation.
    FailedPrecondition,
    /// The operation was aborted, typically by a concurrency conflict.
    Aborted,
    /// The operation was attempted past the valid range.
    OutOfRange,
    /// The operation is not implemented.
    Unimplemented,
    /// An internal invariant was broken.
    Internal,
    /// The service is currently unavailable.
    Unavailable,
    /// Unrecoverable data loss or corruption.
    DataLoss,
    /// The request did not carry valid authentication credentials.
    Unauthenticated,
}

impl ErrCode {
    /// Returns the fixed transport status for this code.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::NoContent => StatusCode::NO_CONTENT,
            Self::Created => StatusCode::CREATED,
            Self::Canceled | Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::Unknown | Self::Internal | Self::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidArgument | Self::FailedPrecondition | Self::OutOfRange => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::Aborted => StatusCode::CONFLICT,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Self::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    /// Returns true if the code must never echo its message to the client.
    ///
    /// Internal-class failures are summarized by their canonical status text;
    /// the real cause is logged server-side only.
    #[must_use]
    pub const fn is_redacted(self) -> bool {
        matches!(self, Self::Internal | Self::Unknown | Self::DataLoss)
    }

    /// Returns the snake_case wire name of the code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoContent => "no_content",
            Self::Created => "created",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out_of_range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data_loss",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An error for a specific request field.
///
/// Rendered to clients as a structured list rather than a collapsed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The field the error applies to.
    pub field: String,
    /// What is wrong with the field.
    pub error: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// A trusted, classified application error.
///
/// Constructed once at the point of failure and consumed once by the error
/// translation stage at the top of the pipeline. The optional `source` chain
/// is diagnostic detail for logs and is never rendered to clients.
#[derive(Debug)]
pub struct AppError {
    code: ErrCode,
    message: String,
    fields: Option<Vec<FieldError>>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Classifies an underlying error with the given code.
    ///
    /// The cause's message becomes the client-facing message unless the code
    /// is [redacted](ErrCode::is_redacted).
    #[must_use]
    pub fn new(code: ErrCode, source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self {
            code,
            message: source.to_string(),
            fields: None,
            source: Some(source),
        }
    }

    /// Creates a classified error from a plain message.
    #[must_use]
    pub fn msg(code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    /// Creates a validation error carrying per-field detail.
    #[must_use]
    pub fn fields(fields: Vec<FieldError>) -> Self {
        Self {
            code: ErrCode::InvalidArgument,
            message: "data validation error".to_string(),
            fields: Some(fields),
            source: None,
        }
    }

    /// Returns the classification code.
    #[must_use]
    pub const fn code(&self) -> ErrCode {
        self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the per-field validation detail, if any.
    #[must_use]
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        self.fields.as_deref()
    }

    /// Returns the transport status for this error.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Returns the message safe to show a client.
    ///
    /// Redacted codes collapse to the canonical status text regardless of the
    /// real cause.
    #[must_use]
    pub fn client_message(&self) -> &str {
        if self.code.is_redacted() {
            self.http_status().canonical_reason().unwrap_or("error")
        } else {
            &self.message
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Untrusted errors classify as `Internal`: nothing about the cause reaches
/// the client, everything reaches the logs.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrCode::Internal, err)
    }
}

/// The result of any pipeline stage.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A classified application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// The underlying transport requested a graceful shutdown.
    ///
    /// This signal must propagate unchanged to the server's top-level loop;
    /// the error translation stage re-raises it instead of rendering it.
    #[error("shutdown requested: {0}")]
    Shutdown(String),
}

impl Error {
    /// Creates a graceful-shutdown signal.
    #[must_use]
    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown(reason.into())
    }

    /// Returns true if this is the graceful-shutdown signal.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [ErrCode; 19] = [
        ErrCode::Ok,
        ErrCode::NoContent,
        ErrCode::Created,
        ErrCode::Canceled,
        ErrCode::Unknown,
        ErrCode::InvalidArgument,
        ErrCode::DeadlineExceeded,
        ErrCode::NotFound,
        ErrCode::AlreadyExists,
        ErrCode::PermissionDenied,
        ErrCode::ResourceExhausted,
        ErrCode::FailedPrecondition,
        ErrCode::Aborted,
        ErrCode::OutOfRange,
        ErrCode::Unimplemented,
        ErrCode::Internal,
        ErrCode::Unavailable,
        ErrCode::DataLoss,
        ErrCode::Unauthenticated,
    ];

    #[test]
    fn test_status_table_is_exact() {
        let want = [
            (ErrCode::Ok, 200),
            (ErrCode::NoContent, 204),
            (ErrCode::Created, 201),
            (ErrCode::InvalidArgument, 400),
            (ErrCode::FailedPrecondition, 400),
            (ErrCode::OutOfRange, 400),
            (ErrCode::Unauthenticated, 401),
            (ErrCode::PermissionDenied, 403),
            (ErrCode::NotFound, 404),
            (ErrCode::Aborted, 409),
            (ErrCode::AlreadyExists, 409),
            (ErrCode::Canceled, 504),
            (ErrCode::DeadlineExceeded, 504),
            (ErrCode::ResourceExhausted, 429),
            (ErrCode::Unimplemented, 501),
            (ErrCode::Internal, 500),
            (ErrCode::Unknown, 500),
            (ErrCode::DataLoss, 500),
            (ErrCode::Unavailable, 503),
        ];
        assert_eq!(want.len(), ALL_CODES.len());
        for (code, status) in want {
            assert_eq!(code.http_status().as_u16(), status, "code {code}");
        }
    }

    #[test]
    fn test_untrusted_errors_become_internal() {
        let cause = anyhow::anyhow!("pq: connection refused");
        let err = AppError::from(cause);
        assert_eq!(err.code(), ErrCode::Internal);
        assert_eq!(err.client_message(), "Internal Server Error");
        // The real cause stays reachable for logging.
        assert!(err.message().contains("connection refused"));
    }

    #[test]
    fn test_trusted_errors_keep_their_message() {
        let err = AppError::msg(ErrCode::NotFound, "user not found");
        assert_eq!(err.client_message(), "user not found");
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_field_errors_are_structured() {
        let err = AppError::fields(vec![
            FieldError::new("email", "must be a valid address"),
            FieldError::new("name", "missing"),
        ]);
        assert_eq!(err.code(), ErrCode::InvalidArgument);
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field, "email");
    }

    #[test]
    fn test_shutdown_is_distinguishable() {
        let err = Error::shutdown("SIGTERM");
        assert!(err.is_shutdown());
        let err = Error::from(AppError::msg(ErrCode::Internal, "boom"));
        assert!(!err.is_shutdown());
    }

    #[test]
    fn test_code_names_roundtrip_serde() {
        for code in ALL_CODES {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.name()));
            let back: ErrCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn test_source_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = AppError::new(ErrCode::Internal, io);
        let src = std::error::Error::source(&err).unwrap();
        assert!(src.to_string().contains("disk on fire"));
    }
}
