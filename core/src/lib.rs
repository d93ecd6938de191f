//! Per-host HTTP client for scraping and fetching workflows.
//!
//! # Overview
//! An `HttpClient` binds to one base host, accumulates configuration (headers,
//! cookies, TLS verification, redirect policy, connect timeout) and then issues
//! requests by relative path over one long-lived transport handle, so
//! keep-alive connections are reused between calls.
//!
//! # Design
//! - Per-call options live on the `Transport`, not on the client; the client
//!   only owns the host and the ordered header list.
//! - The transport returns one raw blob (every hop's headers, then the final
//!   body) plus `TransferInfo`. `request` returns the body, `request_debug`
//!   also splits the header block into one map per hop.
//! - `UreqTransport` is the default transport; anything implementing
//!   `Transport` can stand in for it, which is how the client is unit tested.

pub mod client;
pub mod error;
pub mod http;
pub mod parse;
pub mod transport;

pub use client::HttpClient;
pub use error::ClientError;
pub use http::{HeaderLine, HopHeaders, HttpMethod, RawResponse, RequestResult, TransferInfo, STATUS_KEY};
pub use parse::parse_header_block;
pub use transport::{Transport, UreqTransport};
