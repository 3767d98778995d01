//! The response envelope returned by every model server call.

use std::fmt;

use serde::Serialize;

/// Immutable wrapper around a server reply, carrying the parsed body together
/// with the HTTP status line it arrived with.
///
/// The status fields are always populated, even when the server sent an empty
/// body (an empty delete confirmation, say) — body absence is an explicit
/// `None`, never a missing envelope. There are no mutation methods; every
/// transformation produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    /// Parsed reply body. `None` when the server sent an empty body.
    pub body: Option<T>,
    /// HTTP status code of the reply.
    pub status_code: u16,
    /// HTTP status message of the reply.
    pub status_message: String,
}

impl<T> Response<T> {
    /// Create a new envelope.
    pub fn new(body: Option<T>, status_code: u16, status_message: impl Into<String>) -> Self {
        Self {
            body,
            status_code,
            status_message: status_message.into(),
        }
    }

    /// Apply a pure function to the body, copying the status fields into the
    /// new envelope. An absent body stays absent.
    pub fn map_body<U>(self, mapper: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            body: self.body.map(mapper),
            status_code: self.status_code,
            status_message: self.status_message,
        }
    }

    /// Replace the body outright, keeping the status fields. Used where a
    /// derived value (a marker check, say) stands in for the raw body.
    pub fn with_body<U>(self, body: U) -> Response<U> {
        Response {
            body: Some(body),
            status_code: self.status_code,
            status_message: self.status_message,
        }
    }
}

impl<T: Serialize> fmt::Display for Response<T> {
    /// Human-readable rendering for diagnostic display: status code, status
    /// message, and the JSON-stringified body or the literal `undefined`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            Some(body) => {
                serde_json::to_string(body).unwrap_or_else(|_| "<unserializable>".to_string())
            }
            None => "undefined".to_string(),
        };
        write!(
            f,
            "StatusCode: {}\nStatusMessage: {}\nBody: {}",
            self.status_code, self.status_message, body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn map_body_preserves_status_fields() {
        let response = Response::new(Some(json!({"data": "x"})), 200, "OK");
        let mapped = response.map_body(|body| body["data"].clone());

        assert_eq!(mapped.status_code, 200);
        assert_eq!(mapped.status_message, "OK");
        assert_eq!(mapped.body, Some(json!("x")));
    }

    #[test]
    fn map_body_keeps_absent_body_absent() {
        let response: Response<Value> = Response::new(None, 204, "No Content");
        let mapped = response.map_body(|body| body.to_string());

        assert_eq!(mapped.body, None);
        assert_eq!(mapped.status_code, 204);
    }

    #[test]
    fn with_body_replaces_even_absent_body() {
        let response: Response<Value> = Response::new(None, 200, "OK");
        let replaced = response.with_body(false);

        assert_eq!(replaced.body, Some(false));
        assert_eq!(replaced.status_message, "OK");
    }

    #[test]
    fn display_renders_undefined_for_absent_body() {
        let response: Response<Value> = Response::new(None, 404, "Not Found");
        let rendered = response.to_string();

        assert!(rendered.contains("StatusCode: 404"));
        assert!(rendered.contains("StatusMessage: Not Found"));
        assert!(rendered.contains("Body: undefined"));
    }

    #[test]
    fn display_renders_json_body() {
        let response = Response::new(Some(json!({"type": "success"})), 200, "OK");
        assert!(response.to_string().contains(r#"Body: {"type":"success"}"#));
    }
}
