//! Plain data passed between `HttpClient` and its transport.
//!
//! # Design
//! Headers are kept as structured `HeaderLine` pairs internally and only
//! rendered as `"Name: value"` text at the edges. Responses travel as one raw
//! byte blob (every hop's headers, then the final body) plus `TransferInfo`,
//! which records where the header block ends.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Key under which each hop's status line is stored in `HopHeaders`.
pub const STATUS_KEY: &str = "status";

/// Headers of a single hop, keyed by header name as received.
pub type HopHeaders = BTreeMap<String, String>;

/// HTTP method the transport is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// One request header as a name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: String,
    pub value: String,
}

impl HeaderLine {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a raw `"Name: value"` line. Without a colon the whole line is the
    /// name and the value is empty.
    pub fn parse(line: &str) -> Self {
        match line.split_once(':') {
            Some((name, value)) => Self::new(name.trim(), value.trim()),
            None => Self::new(line.trim(), ""),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Metadata the transport reports for one logical request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferInfo {
    /// URL of the last hop.
    pub url: String,
    pub http_code: u16,
    /// Length in bytes of the header block at the start of `RawResponse::data`.
    pub header_size: usize,
    pub redirect_count: u32,
    pub content_type: Option<String>,
    /// Seconds spent on the whole exchange.
    pub total_time: f64,
}

/// Everything the transport received: all hops' headers, then the final body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub data: Vec<u8>,
    pub info: TransferInfo,
}

impl RawResponse {
    /// Split `data` at `info.header_size` into `(header_block, body)`.
    ///
    /// A header size past the end of the data is clamped, so a truncated
    /// response yields an empty body rather than a panic.
    pub fn split(&self) -> (&[u8], &[u8]) {
        let at = self.info.header_size.min(self.data.len());
        self.data.split_at(at)
    }
}

/// Detailed result of `HttpClient::request_debug`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResult {
    /// Body of the last hop.
    pub body: String,
    pub info: TransferInfo,
    /// One map per hop, in the order the responses arrived. Names are as the
    /// transport reported them; `UreqTransport` goes through the `http` crate,
    /// which lower-cases every header name (`location`, `content-type`).
    pub headers: Vec<HopHeaders>,
}

impl RequestResult {
    /// Headers of the response whose body was returned.
    pub fn final_headers(&self) -> Option<&HopHeaders> {
        self.headers.last()
    }

    /// Status line of hop `hop`, counting from 1.
    pub fn status_line(&self, hop: usize) -> Option<&str> {
        hop.checked_sub(1)
            .and_then(|i| self.headers.get(i))
            .and_then(|h| h.get(STATUS_KEY))
            .map(String::as_str)
    }
}
