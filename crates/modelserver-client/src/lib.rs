//! # Model Server Client
//!
//! Client SDK for a remote model-persistence server: a typed REST
//! request/response layer plus a long-lived WebSocket subscription channel
//! delivering push notifications for a subscribed model.
//!
//! ## Overview
//!
//! - [`ModelServerClient`] — the stable API surface (get/getAll/delete/
//!   update/getSchema/configure/ping/edit/subscribe/unsubscribe)
//! - [`RestModelServerClient`] — the default implementation over
//!   [`RestTransport`]
//! - [`SubscriptionChannel`] — one push channel per client with four event
//!   kinds: opened, message, closed, errored
//!
//! Model payloads are opaque JSON; the client knows the server's path
//! conventions and query-parameter encoding, nothing about model content.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelserver_client::{LaunchOptions, ModelServerClient, RestModelServerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestModelServerClient::new();
//!     client.initialize(Some(LaunchOptions::default())).await;
//!
//!     let alive = client.ping().await?;
//!     println!("server alive: {:?}", alive.body);
//!
//!     // Register listeners before subscribing; there is no event replay.
//!     client.on_message(Box::new(|notification| {
//!         println!("model changed: {:?}", notification);
//!     }));
//!     client.subscribe("file:///workspace/coffee.ecore").await?;
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod client;
mod rest;
mod subscription;

pub use client::{ModelServerClient, RestModelServerClient};
pub use rest::RestTransport;
pub use subscription::{
    ChannelState, CloseNotice, ClosedListener, ErrorListener, ListenerHandle, MessageListener,
    OpenListener, SubscriptionChannel, SubscriptionMessage,
};

// Re-export foundation types for convenience
pub use modelserver_core::{
    paths, ClientError, ClientResult, LaunchOptions, Response, ServerConfiguration,
};
