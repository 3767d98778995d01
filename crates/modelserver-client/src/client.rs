//! The model server client API surface.
//!
//! [`ModelServerClient`] is the entire contract embedding layers (commands,
//! menus, process-boundary forwarders) may depend on. The concrete
//! [`RestModelServerClient`] translates each operation into exactly one REST
//! call and owns the single subscription channel.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use modelserver_core::{
    paths, ClientError, ClientResult, LaunchOptions, Response, ServerConfiguration,
};

use crate::rest::RestTransport;
use crate::subscription::{
    ClosedListener, ErrorListener, ListenerHandle, MessageListener, OpenListener,
    SubscriptionChannel,
};

/// The stable surface of a model server client.
///
/// Every data operation is asynchronous and issues exactly one request; none
/// may be called before [`initialize`](Self::initialize) succeeded. Model
/// payloads and edit commands are opaque JSON. Application-level rejections
/// (a 4xx status, a marker other than `"success"`) travel inside the returned
/// [`Response`]; an `Err` means the call itself failed.
#[async_trait]
pub trait ModelServerClient: Send + Sync {
    /// Prepare the client for use. Returns `false` when `options` is absent
    /// or unusable, `true` once the base URL is built and calls may be
    /// issued. Calling again replaces the connection; the last call wins.
    async fn initialize(&self, options: Option<LaunchOptions>) -> bool;

    /// Fetch the model stored under `model_uri`.
    async fn get(&self, model_uri: &str) -> ClientResult<Response<Value>>;

    /// Fetch the identifiers of all models the server knows.
    async fn get_all(&self) -> ClientResult<Response<Value>>;

    /// Delete the model stored under `model_uri`. The body is `true` iff the
    /// server confirmed the deletion; any other reply yields `false`.
    async fn delete(&self, model_uri: &str) -> ClientResult<Response<bool>>;

    /// Replace the model stored under `model_uri` with `new_model`.
    async fn update(&self, model_uri: &str, new_model: &Value) -> ClientResult<Response<Value>>;

    /// Fetch the type schema of the model stored under `model_uri`.
    async fn get_schema(&self, model_uri: &str) -> ClientResult<Response<Value>>;

    /// Send the workspace configuration. The body is `true` iff the server
    /// acknowledged with a success marker.
    async fn configure(&self, configuration: &ServerConfiguration)
        -> ClientResult<Response<bool>>;

    /// Probe server liveness. Marker policy as [`configure`](Self::configure).
    async fn ping(&self) -> ClientResult<Response<bool>>;

    /// Forward an edit command for `model_uri` verbatim. Fire-and-forget:
    /// effects are observed through the subscription channel.
    async fn edit(&self, model_uri: &str, command: &Value) -> ClientResult<()>;

    /// Open the subscription channel for `model_uri`. At most one channel is
    /// open per client; channel effects are observed through listeners only.
    async fn subscribe(&self, model_uri: &str) -> ClientResult<()>;

    /// Close the subscription channel for `model_uri`.
    async fn unsubscribe(&self, model_uri: &str) -> ClientResult<()>;

    /// Register a listener for the channel-opened event.
    fn on_open(&self, listener: OpenListener) -> ListenerHandle;

    /// Register a listener for inbound push notifications.
    fn on_message(&self, listener: MessageListener) -> ListenerHandle;

    /// Register a listener for the channel-closed event.
    fn on_closed(&self, listener: ClosedListener) -> ListenerHandle;

    /// Register a listener for channel failures.
    fn on_error(&self, listener: ErrorListener) -> ListenerHandle;

    /// Deregister a previously registered listener.
    fn remove_listener(&self, handle: ListenerHandle);
}

/// Connection state built by `initialize`, immutable afterwards.
struct Connection {
    rest: RestTransport,
    options: LaunchOptions,
}

/// Default client implementation: REST calls over [`RestTransport`] plus one
/// WebSocket [`SubscriptionChannel`].
#[derive(Debug, Default)]
pub struct RestModelServerClient {
    connection: RwLock<Option<Connection>>,
    subscription: SubscriptionChannel,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.rest.base_url())
            .finish()
    }
}

impl RestModelServerClient {
    /// Create an uninitialized client. Every data operation fails with
    /// [`ClientError::NotInitialized`] until `initialize` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle state of the subscription channel, for diagnostics.
    pub fn subscription_state(&self) -> crate::subscription::ChannelState {
        self.subscription.state()
    }

    async fn transport(&self) -> ClientResult<RestTransport> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|connection| connection.rest.clone())
            .ok_or(ClientError::NotInitialized)
    }

    async fn subscription_endpoint(&self, model_uri: &str) -> ClientResult<String> {
        let connection = self.connection.read().await;
        let connection = connection.as_ref().ok_or(ClientError::NotInitialized)?;
        Ok(format!(
            "{}{}{}",
            connection.options.ws_base_url(),
            paths::SUBSCRIPTION,
            model_uri_query(model_uri)
        ))
    }
}

/// `?modeluri=<uri>` with the identifier percent-encoded into the query
/// value, keeping the path segment literal.
fn model_uri_query(model_uri: &str) -> String {
    RestTransport::encode_query([(paths::MODEL_URI_PARAMETER, model_uri)])
}

/// Project the `data` field out of a reply body; `Null` when missing.
fn data_field(body: Value) -> Value {
    body.get("data").cloned().unwrap_or(Value::Null)
}

/// Whether the reply's `type` marker equals `expected`. An absent body or
/// marker is a plain `false`, never an error.
fn marker_is(body: Option<&Value>, expected: &str) -> bool {
    body.and_then(|b| b.get("type"))
        .and_then(Value::as_str)
        .map(|marker| marker == expected)
        .unwrap_or(false)
}

#[async_trait]
impl ModelServerClient for RestModelServerClient {
    async fn initialize(&self, options: Option<LaunchOptions>) -> bool {
        let Some(options) = options else {
            warn!("initialize called without launch options");
            return false;
        };

        let base_url = options.http_base_url();
        if let Err(e) = Url::parse(&base_url) {
            warn!(%base_url, error = %e, "launch options yield no usable base URL");
            return false;
        }

        let rest = match RestTransport::new(base_url) {
            Ok(rest) => rest,
            Err(e) => {
                warn!(error = %e, "failed to build REST transport");
                return false;
            }
        };

        info!(base_url = rest.base_url(), "model server client initialized");
        *self.connection.write().await = Some(Connection { rest, options });
        true
    }

    async fn get(&self, model_uri: &str) -> ClientResult<Response<Value>> {
        let rest = self.transport().await?;
        let path = format!("{}{}", paths::MODEL_CRUD, model_uri_query(model_uri));
        let response = rest.request::<Value>(Method::GET, &path, None).await?;
        Ok(response.map_body(data_field))
    }

    async fn get_all(&self) -> ClientResult<Response<Value>> {
        let rest = self.transport().await?;
        let response = rest
            .request::<Value>(Method::GET, paths::MODEL_CRUD, None)
            .await?;
        Ok(response.map_body(data_field))
    }

    async fn delete(&self, model_uri: &str) -> ClientResult<Response<bool>> {
        let rest = self.transport().await?;
        let path = format!("{}{}", paths::MODEL_CRUD, model_uri_query(model_uri));
        let response = rest.request::<Value>(Method::DELETE, &path, None).await?;
        let confirmed = marker_is(response.body.as_ref(), "confirm");
        Ok(response.with_body(confirmed))
    }

    async fn update(&self, model_uri: &str, new_model: &Value) -> ClientResult<Response<Value>> {
        let rest = self.transport().await?;
        let path = format!("{}{}", paths::MODEL_CRUD, model_uri_query(model_uri));
        let response = rest
            .request::<Value>(Method::PATCH, &path, Some(new_model))
            .await?;
        Ok(response.map_body(data_field))
    }

    async fn get_schema(&self, model_uri: &str) -> ClientResult<Response<Value>> {
        let rest = self.transport().await?;
        let path = format!("{}{}", paths::SCHEMA, model_uri_query(model_uri));
        let response = rest.request::<Value>(Method::GET, &path, None).await?;
        Ok(response.map_body(data_field))
    }

    async fn configure(
        &self,
        configuration: &ServerConfiguration,
    ) -> ClientResult<Response<bool>> {
        let rest = self.transport().await?;
        let body = serde_json::to_value(configuration)
            .map_err(|e| ClientError::SerializationFailed(e.to_string()))?;
        let response = rest
            .request::<Value>(Method::PUT, paths::SERVER_CONFIGURE, Some(&body))
            .await?;
        let succeeded = marker_is(response.body.as_ref(), "success");
        Ok(response.with_body(succeeded))
    }

    async fn ping(&self) -> ClientResult<Response<bool>> {
        let rest = self.transport().await?;
        let response = rest
            .request::<Value>(Method::GET, paths::SERVER_PING, None)
            .await?;
        let succeeded = marker_is(response.body.as_ref(), "success");
        Ok(response.with_body(succeeded))
    }

    async fn edit(&self, model_uri: &str, command: &Value) -> ClientResult<()> {
        let rest = self.transport().await?;
        let path = format!("{}{}", paths::EDIT, model_uri_query(model_uri));
        let body = json!({ "data": command });
        rest.request::<Value>(Method::PATCH, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn subscribe(&self, model_uri: &str) -> ClientResult<()> {
        let endpoint = self.subscription_endpoint(model_uri).await?;
        self.subscription.subscribe(&endpoint, model_uri).await
    }

    async fn unsubscribe(&self, model_uri: &str) -> ClientResult<()> {
        self.subscription.unsubscribe(model_uri).await
    }

    fn on_open(&self, listener: OpenListener) -> ListenerHandle {
        self.subscription.on_open(listener)
    }

    fn on_message(&self, listener: MessageListener) -> ListenerHandle {
        self.subscription.on_message(listener)
    }

    fn on_closed(&self, listener: ClosedListener) -> ListenerHandle {
        self.subscription.on_closed(listener)
    }

    fn on_error(&self, listener: ErrorListener) -> ListenerHandle {
        self.subscription.on_error(listener)
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        self.subscription.remove_listener(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn initialize_without_options_returns_false() {
        let client = RestModelServerClient::new();
        assert!(!client.initialize(None).await);
    }

    #[tokio::test]
    async fn initialize_with_options_returns_true() {
        let client = RestModelServerClient::new();
        assert!(client.initialize(Some(LaunchOptions::default())).await);
    }

    #[tokio::test]
    async fn calls_before_initialize_fail_deterministically() {
        let client = RestModelServerClient::new();

        for _ in 0..2 {
            assert!(matches!(
                client.get("file:///a.ecore").await,
                Err(ClientError::NotInitialized)
            ));
            assert!(matches!(client.ping().await, Err(ClientError::NotInitialized)));
            assert!(matches!(
                client.subscribe("file:///a.ecore").await,
                Err(ClientError::NotInitialized)
            ));
        }
    }

    #[tokio::test]
    async fn unsubscribe_without_subscription_fails() {
        let client = RestModelServerClient::new();
        client.initialize(Some(LaunchOptions::default())).await;
        assert!(matches!(
            client.unsubscribe("file:///a.ecore").await,
            Err(ClientError::NotSubscribed(_))
        ));
    }

    #[test]
    fn marker_check_tolerates_absent_and_foreign_markers() {
        assert!(marker_is(Some(&json!({"type": "confirm"})), "confirm"));
        assert!(!marker_is(Some(&json!({"type": "error"})), "confirm"));
        assert!(!marker_is(Some(&json!({})), "confirm"));
        assert!(!marker_is(None, "confirm"));
    }

    #[test]
    fn data_projection_yields_null_when_missing() {
        assert_eq!(data_field(json!({"data": [1, 2]})), json!([1, 2]));
        assert_eq!(data_field(json!({"other": 1})), Value::Null);
    }
}
