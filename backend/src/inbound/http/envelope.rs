//! Uniform `{success, message, data}` response envelope.
//!
//! Every JSON response leaves the process wrapped in this shape. Failures use
//! the sibling `error` member instead of `data` (see [`super::error`]).

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::{ETAG, HeaderValue};
use serde::Serialize;
use utoipa::ToSchema;

/// Successful response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// Render with `status`.
    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

/// `200 OK` with `data`.
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    Envelope::new(message, data).respond(StatusCode::OK)
}

/// `201 Created` with `data`.
pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    Envelope::new(message, data).respond(StatusCode::CREATED)
}

/// Quote a concurrency token as an entity tag.
pub fn entity_tag(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("\"{token}\"")).ok()
}

/// Attach an `ETag` header carrying `token` to `response`.
pub fn with_etag(mut response: HttpResponse, token: &str) -> HttpResponse {
    if let Some(value) = entity_tag(token) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[actix_web::test]
    async fn wraps_data_with_success_flag() {
        let response = created("Document created", json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body()).await.expect("body");
        let value: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(
            value,
            json!({"success": true, "message": "Document created", "data": {"id": 1}})
        );
    }

    #[rstest]
    fn etags_are_quoted() {
        let response = with_etag(ok("ok", ()), "abc123");
        assert_eq!(
            response.headers().get(ETAG).and_then(|v| v.to_str().ok()),
            Some("\"abc123\"")
        );
    }
}
