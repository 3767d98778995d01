//! Minimal JSON REST transport.
//!
//! Serializes a body to JSON, issues the request with fixed JSON headers
//! against `base_url + path`, and normalizes the reply into a
//! [`Response`] envelope. Status codes are captured, never interpreted —
//! marker checks (`"success"`, `"confirm"`) belong to the client layer,
//! applied through the envelope's projection. No retries at this layer.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use modelserver_core::{ClientError, ClientResult, Response};

/// Characters escaped inside query keys and values: everything but ASCII
/// alphanumerics and `-_.~`. Reserved characters such as `#` and `/` inside a
/// model uri never leak into the request path.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A small helper for performing JSON REST requests against a fixed base URL.
#[derive(Debug, Clone)]
pub struct RestTransport {
    base_url: String,
    http: HttpClient,
}

impl RestTransport {
    /// Create a transport rooted at `base_url`.
    ///
    /// The base URL is normalized to end with exactly one trailing `/` so
    /// paths concatenate without double separators.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        base_url.push('/');

        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self { base_url, http })
    }

    /// The normalized base URL, trailing slash included.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and normalize the reply into a [`Response`].
    ///
    /// An empty reply body becomes `body: None` with the status fields still
    /// populated; a non-empty body that is not valid JSON is an error.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<Response<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "issuing model server request");

        let mut request = self
            .http
            .request(method, &url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            let json = serde_json::to_string(body)
                .map_err(|e| ClientError::SerializationFailed(e.to_string()))?;
            request = request.body(json);
        }

        let reply = request
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let status_code = reply.status().as_u16();
        let status_message = reply
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string();

        let bytes = reply
            .bytes()
            .await
            .map_err(|e| ClientError::ReceiveFailed(e.to_string()))?;

        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).map_err(|e| {
                warn!(%url, error = %e, "model server reply was not valid JSON");
                ClientError::SerializationFailed(e.to_string())
            })?)
        };

        debug!(status_code, "model server reply received");
        Ok(Response::new(body, status_code, status_message))
    }

    /// Encode query parameters as a leading-`?`, `&`-joined, percent-encoded
    /// `key=value` string. An empty mapping yields an empty string.
    pub fn encode_query<'a>(parameters: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let encoded: Vec<String> = parameters
            .into_iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_COMPONENT),
                    utf8_percent_encode(value, QUERY_COMPONENT)
                )
            })
            .collect();

        if encoded.is_empty() {
            String::new()
        } else {
            format!("?{}", encoded.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_exactly_one_trailing_slash() {
        let transport = RestTransport::new("http://localhost:8081/api/v1").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8081/api/v1/");

        let transport = RestTransport::new("http://localhost:8081/api/v1//").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8081/api/v1/");
    }

    #[test]
    fn encode_query_is_empty_for_empty_mapping() {
        assert_eq!(RestTransport::encode_query([]), "");
    }

    #[test]
    fn encode_query_escapes_reserved_uri_characters() {
        let query = RestTransport::encode_query([("modeluri", "file:///tmp/a.ecore#main")]);
        assert_eq!(query, "?modeluri=file%3A%2F%2F%2Ftmp%2Fa.ecore%23main");
    }

    #[test]
    fn encode_query_joins_pairs_in_order() {
        let query = RestTransport::encode_query([("a", "1"), ("b", "two words")]);
        assert_eq!(query, "?a=1&b=two%20words");
    }
}
