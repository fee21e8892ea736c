use http::StatusCode;

use crate::client::BoxError;

pub use dns_types::protocol::deserialise::Error as DecodeError;
pub use dns_types::protocol::serialise::Error as EncodeError;

/// Everything which can go wrong with a query.  Nothing is retried:
/// the first failure ends the query.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query could not be built, usually because the name is not
    /// a valid domain name.
    #[error("could not encode query: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a 2xx status, but the body is not a
    /// DNS message.
    #[error("could not decode response: {0}")]
    Decode(#[from] DecodeError),
}

/// Failures getting a response out of the server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// Any status outside 2xx.  The body is not looked at.
    #[error("bad response code: {0}")]
    Status(StatusCode),

    /// Connection, TLS, timeout, or other failure inside the HTTP
    /// client.
    #[error("HTTP request failed: {0}")]
    Request(#[source] BoxError),
}
