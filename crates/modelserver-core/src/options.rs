//! Launch options addressing a running model server instance.

use serde::{Deserialize, Serialize};

/// Connection parameters for a running model server.
///
/// Supplied once to `initialize` before any call is issued; the base URL every
/// request is built against is derived from these fields and fixed afterwards.
/// `additional_args` belong to whoever launches the server process and are
/// opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOptions {
    /// Host the server listens on.
    pub hostname: String,
    /// Port the server listens on.
    pub server_port: u16,
    /// Base path of the REST API, e.g. `api/v1`.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Extra arguments handed to the server launcher.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            server_port: 8081,
            base_url: "api/v1".to_string(),
            additional_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// HTTP base URL all REST calls are issued against.
    ///
    /// Normalized to end with exactly one `/`, regardless of how many
    /// trailing slashes `base_url` carries.
    pub fn http_base_url(&self) -> String {
        self.base_url_with_scheme("http")
    }

    /// WebSocket base URL the subscription channel connects through.
    pub fn ws_base_url(&self) -> String {
        self.base_url_with_scheme("ws")
    }

    fn base_url_with_scheme(&self, scheme: &str) -> String {
        let mut url = format!(
            "{}://{}:{}/{}",
            scheme, self.hostname, self.server_port, self.base_url
        );
        while url.ends_with('/') {
            url.pop();
        }
        url.push('/');
        url
    }
}

/// Workspace configuration sent to the server's configure endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    /// Root directory of the workspace the server should operate on.
    #[serde(rename = "workspaceRoot")]
    pub workspace_root: String,
}
