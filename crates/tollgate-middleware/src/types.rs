//! Common types used throughout the middleware pipeline.
//!
//! This module re-exports HTTP request and response types used by middleware.

use bytes::Bytes;
use http_body_util::Full;
use serde::Serialize;

use tollgate_core::{AppError, FieldError};

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// The client-facing error envelope.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

/// Extension trait for building pipeline responses.
pub trait ResponseExt {
    /// Creates a JSON response with the given status and body.
    fn json<T: Serialize>(status: http::StatusCode, body: &T) -> Response;

    /// Renders a classified error as its client-facing JSON envelope.
    ///
    /// The status comes from the error's code table and the message is the
    /// redaction-aware client message.
    fn app_error(err: &AppError) -> Response;
}

impl ResponseExt for Response {
    fn json<T: Serialize>(status: http::StatusCode, body: &T) -> Response {
        let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(bytes)))
            .expect("failed to build JSON response")
    }

    fn app_error(err: &AppError) -> Response {
        let body = ErrorBody {
            error: err.client_message(),
            fields: err.field_errors(),
        };
        Self::json(err.http_status(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use tollgate_core::ErrCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_trusted_error_renders_message() {
        let err = AppError::msg(ErrCode::NotFound, "user not found");
        let response = Response::app_error(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["error"], "user not found");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_is_redacted() {
        let err = AppError::new(ErrCode::Internal, anyhow::anyhow!("pq: syntax error"));
        let response = Response::app_error(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_field_errors_serialize_as_list() {
        let err = AppError::fields(vec![FieldError::new("email", "missing")]);
        let response = Response::app_error(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["fields"][0]["field"], "email");
        assert_eq!(body["fields"][0]["error"], "missing");
    }
}
