//! Client error types.

use thiserror::Error;

/// A specialized `Result` type for model server client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Represents errors that can occur while talking to a model server.
///
/// The client never retries transparently and never synthesizes an error from
/// a non-2xx HTTP status; application-level rejections travel inside the
/// [`Response`](crate::Response) envelope. These variants cover transport
/// failures and precondition violations only.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ClientError {
    /// The client was used before `initialize` completed with launch options.
    #[error("client not initialized: call `initialize` with launch options first")]
    NotInitialized,

    /// The launch options could not be turned into a usable base URL.
    #[error("invalid launch options: {0}")]
    InvalidOptions(String),

    /// Failed to reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request went out but the reply could not be read.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Failed to serialize a request body, or the reply body was not valid JSON.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// A subscription channel is already open for the named model uri.
    #[error("subscription already open for {0}")]
    AlreadySubscribed(String),

    /// No subscription channel is open for the named model uri.
    #[error("no open subscription for {0}")]
    NotSubscribed(String),

    /// The subscription channel was used after it terminated.
    #[error("subscription channel closed: {0}")]
    ChannelClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = ClientError::ConnectionFailed("connection refused".to_string());
        assert_eq!(err.to_string(), "connection failed: connection refused");

        let err = ClientError::AlreadySubscribed("file:///a.ecore".to_string());
        assert_eq!(
            err.to_string(),
            "subscription already open for file:///a.ecore"
        );
    }
}
