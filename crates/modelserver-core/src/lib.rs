//! # Model Server Core
//!
//! Foundation types for the model server client SDK. This crate provides the
//! abstractions every other layer depends on:
//!
//! - **Envelope**: [`Response`] — the immutable status-carrying wrapper around
//!   every server reply
//! - **Errors**: [`ClientError`], [`ClientResult`]
//! - **Addressing**: [`LaunchOptions`], [`ServerConfiguration`], and the
//!   [`paths`] constants of the server's REST API
//!
//! Model payloads are opaque JSON throughout; nothing in this crate interprets
//! model content.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod error;
mod options;
mod response;

pub mod paths;

pub use error::{ClientError, ClientResult};
pub use options::{LaunchOptions, ServerConfiguration};
pub use response::Response;
