//! Error types for the per-host client.
//!
//! # Design
//! Construction failures (`InvalidHost`, `MissingHostname`, `UnsupportedScheme`)
//! are raised before any transport exists. Everything the network can do wrong
//! lands in `Transport` with the underlying `ureq::Error` attached, so callers
//! never confuse "the server sent an empty body" with "nothing was received".
//! Malformed response headers are not an error; the parser degrades instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by `HttpClient` and its transports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base host is not an absolute URL.
    #[error("invalid host URL {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    /// The base host parsed, but has no hostname to send in the `Host` header.
    #[error("host URL {0:?} has no hostname")]
    MissingHostname(String),

    /// Only `http` and `https` are supported.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// DNS, connect, TLS, timeout or protocol failure reported by ureq.
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// A redirect carried a `Location` that cannot be resolved to a URL.
    #[error("cannot follow redirect from {from} to {location:?}: {source}")]
    InvalidRedirect {
        from: String,
        location: String,
        #[source]
        source: url::ParseError,
    },

    /// The cookie jar file could not be read or written.
    #[error("cookie jar {path:?}: {source}")]
    CookieJar {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cookie jar file is not in the expected JSON format.
    #[error("cookie jar {path:?}: {message}")]
    CookieFormat { path: PathBuf, message: String },
}
