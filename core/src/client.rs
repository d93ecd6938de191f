//! Per-host HTTP client with fluent configuration.
//!
//! # Design
//! `HttpClient` holds a base `host`, an ordered list of request headers and
//! one owned transport handle. Configuration methods forward straight to the
//! transport, so the handle is the only place per-call options live. Requests
//! take a path relative to the host and reuse the same handle every time.
//!
//! The handle is released exactly once: by `close`, or by `Drop` if the client
//! goes out of scope without being closed.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::http::{HeaderLine, HttpMethod, RawResponse, RequestResult};
use crate::parse::parse_header_block;
use crate::transport::{Transport, UreqTransport};

pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3";

/// Synchronous client bound to one remote host.
///
/// Not meant to be shared between threads without external locking; create
/// one client per host instead.
pub struct HttpClient<T: Transport = UreqTransport> {
    host: String,
    headers: Vec<HeaderLine>,
    transport: T,
    closed: bool,
}

impl HttpClient {
    /// Create a client for `host` on the default ureq transport.
    ///
    /// `host` must be an absolute `http` or `https` URL. A trailing slash is
    /// optional.
    pub fn new(host: &str) -> Result<Self, ClientError> {
        Self::open(host)
    }
}

impl<T: Transport> HttpClient<T> {
    /// Create a client for `host` on transport `T`.
    pub fn open(host: &str) -> Result<Self, ClientError> {
        let url = Url::parse(host).map_err(|source| ClientError::InvalidHost {
            host: host.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::UnsupportedScheme(url.scheme().to_string()));
        }
        let hostname = url
            .host_str()
            .ok_or_else(|| ClientError::MissingHostname(host.to_string()))?;
        let host_header = match url.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.to_string(),
        };

        let transport = T::open(&url)?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            headers: vec![
                HeaderLine::new("Host", host_header),
                HeaderLine::new("Accept", DEFAULT_ACCEPT),
                HeaderLine::new("Accept-Language", DEFAULT_ACCEPT_LANGUAGE),
                HeaderLine::new("Connection", "keep-alive"),
            ],
            transport,
            closed: false,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Headers sent with every request, in order.
    pub fn headers(&self) -> &[HeaderLine] {
        &self.headers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Enable or disable both peer certificate and hostname verification.
    pub fn with_tls_verification(&mut self, enabled: bool) -> &mut Self {
        self.transport.set_tls_verification(enabled);
        self
    }

    /// Switch between POST and GET.
    ///
    /// With `post` set, `form` (if given) becomes a URL-encoded request body.
    /// Without it, any previous body is cleared and the transport goes back to
    /// GET.
    pub fn with_method<I, K, V>(&mut self, post: bool, form: Option<I>) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if post {
            self.transport.set_method(HttpMethod::Post);
            if let Some(form) = form {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(form)
                    .finish();
                self.transport.set_body(Some(body));
            }
        } else {
            self.transport.set_body(None);
            self.transport.set_method(HttpMethod::Get);
        }
        self
    }

    pub fn with_get(&mut self) -> &mut Self {
        self.with_method(false, None::<[(&str, &str); 0]>)
    }

    pub fn with_post_form<I, K, V>(&mut self, form: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.with_method(true, Some(form))
    }

    /// Read cookies from and save them to `path`. Use an absolute path.
    pub fn with_cookie_jar(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.transport.set_cookie_jar(path.into());
        self
    }

    /// Append a raw `"Name: value"` header. Earlier headers with the same name
    /// are kept; all of them are sent.
    pub fn add_header(&mut self, line: &str) -> &mut Self {
        self.headers.push(HeaderLine::parse(line));
        self
    }

    pub fn add_headers<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.add_header(line.as_ref());
        }
        self
    }

    pub fn with_referer(&mut self, url: &str) -> &mut Self {
        self.headers.push(HeaderLine::new("Referer", url));
        self
    }

    pub fn with_user_agent(&mut self, agent: &str) -> &mut Self {
        self.headers.push(HeaderLine::new("User-Agent", agent));
        self
    }

    /// Follow at most `max_hops` redirects. `0` disables following.
    pub fn with_redirect_policy(&mut self, max_hops: u32) -> &mut Self {
        self.transport.set_max_redirects(max_hops);
        self
    }

    /// Connect timeout in seconds. The rest of the exchange is not limited.
    pub fn with_timeout(&mut self, seconds: u64) -> &mut Self {
        self.transport.set_connect_timeout(Duration::from_secs(seconds));
        self
    }

    /// Join `path` onto the host with exactly one slash between them.
    pub fn full_url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path.trim_start_matches('/'))
    }

    /// Fetch `path` and return the body of the final response.
    pub fn request(&mut self, path: &str) -> Result<String, ClientError> {
        let raw = self.perform(path)?;
        let (_, body) = raw.split();
        Ok(String::from_utf8_lossy(body).into_owned())
    }

    /// Fetch `path` and return the body together with transfer info and the
    /// headers of every hop.
    pub fn request_debug(&mut self, path: &str) -> Result<RequestResult, ClientError> {
        let raw = self.perform(path)?;
        let (head, body) = raw.split();
        let headers = parse_header_block(&String::from_utf8_lossy(head));
        let body = String::from_utf8_lossy(body).into_owned();
        Ok(RequestResult {
            body,
            info: raw.info,
            headers,
        })
    }

    /// Release the transport, reporting any error it hits while doing so.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.closed = true;
        self.transport.close()
    }

    fn perform(&mut self, path: &str) -> Result<RawResponse, ClientError> {
        let url = self.full_url(path);
        let raw = self.transport.perform(&url, &self.headers)?;
        debug!(
            "{url} -> {} ({} header bytes, {} body bytes, {} redirect(s))",
            raw.info.http_code,
            raw.info.header_size,
            raw.data.len().saturating_sub(raw.info.header_size),
            raw.info.redirect_count
        );
        Ok(raw)
    }
}

impl<T: Transport> Drop for HttpClient<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.close() {
            warn!("closing client for {}: {e}", self.host);
        }
    }
}
