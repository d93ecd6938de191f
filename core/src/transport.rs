//! The transport seam and its ureq-backed implementation.
//!
//! # Design
//! `HttpClient` never stores per-call options itself. Every configuration
//! method is forwarded to the owned `Transport` as a command, and the transport
//! keeps that state until it is overwritten. One transport value lives as long
//! as its client, which is what lets keep-alive connections be reused between
//! requests.
//!
//! `UreqTransport` follows redirects itself, one hop at a time, so it can write
//! every hop's status line and headers into the raw header block the same way
//! a curl header dump looks: hop after hop, each terminated by a blank line.
//! Cookies live in a `CookieStore` owned by the transport rather than by the
//! agent, so they survive agent rebuilds and see every hop's `Set-Cookie`.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use cookie_store::CookieStore;
use log::{debug, warn};
use ureq::http::{header, Response, StatusCode, Version};
use ureq::tls::TlsConfig;
use ureq::{Agent, Body, RequestBuilder};
use url::Url;

use crate::error::ClientError;
use crate::http::{HeaderLine, HttpMethod, RawResponse, TransferInfo};

/// Content type sent with URL-encoded form bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A transport handle owned by one `HttpClient`.
///
/// Setters only record state; nothing touches the network until `perform`.
pub trait Transport: Sized {
    /// Create the handle for a client bound to `base`.
    fn open(base: &Url) -> Result<Self, ClientError>;

    /// Turn peer certificate and hostname checks on or off together.
    fn set_tls_verification(&mut self, enabled: bool);

    fn set_method(&mut self, method: HttpMethod);

    /// Request body for POST requests. `None` clears it.
    fn set_body(&mut self, body: Option<String>);

    /// Maximum number of redirects to follow. `0` disables following.
    fn set_max_redirects(&mut self, hops: u32);

    /// File cookies are read from and written back to.
    fn set_cookie_jar(&mut self, path: PathBuf);

    fn set_connect_timeout(&mut self, timeout: Duration);

    /// Execute one logical request, following redirects as configured.
    fn perform(&mut self, url: &str, headers: &[HeaderLine]) -> Result<RawResponse, ClientError>;

    /// Release the handle. Called exactly once by the owning client.
    fn close(&mut self) -> Result<(), ClientError>;
}

/// Blocking transport backed by a single `ureq::Agent`.
pub struct UreqTransport {
    agent: Agent,
    /// Set when an agent-level option changed since the agent was built.
    agent_stale: bool,
    verify_tls: bool,
    connect_timeout: Option<Duration>,
    method: HttpMethod,
    body: Option<String>,
    max_redirects: u32,
    cookies: CookieStore,
    cookie_jar: Option<PathBuf>,
    jar_loaded: bool,
}

impl Transport for UreqTransport {
    fn open(base: &Url) -> Result<Self, ClientError> {
        debug!("opening transport for {base}");
        Ok(Self {
            agent: build_agent(true, None),
            agent_stale: false,
            verify_tls: true,
            connect_timeout: None,
            method: HttpMethod::Get,
            body: None,
            max_redirects: 0,
            cookies: CookieStore::default(),
            cookie_jar: None,
            jar_loaded: false,
        })
    }

    fn set_tls_verification(&mut self, enabled: bool) {
        if self.verify_tls != enabled {
            self.verify_tls = enabled;
            self.agent_stale = true;
        }
    }

    fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }

    fn set_max_redirects(&mut self, hops: u32) {
        self.max_redirects = hops;
    }

    fn set_cookie_jar(&mut self, path: PathBuf) {
        if !path.is_absolute() {
            warn!(
                "cookie jar path {} is relative; it resolves against the working directory",
                path.display()
            );
        }
        self.cookie_jar = Some(path);
        self.jar_loaded = false;
    }

    fn set_connect_timeout(&mut self, timeout: Duration) {
        if self.connect_timeout != Some(timeout) {
            self.connect_timeout = Some(timeout);
            self.agent_stale = true;
        }
    }

    fn perform(&mut self, url: &str, headers: &[HeaderLine]) -> Result<RawResponse, ClientError> {
        let started = Instant::now();
        self.prepare_agent()?;

        let mut current = Url::parse(url).map_err(|source| ClientError::InvalidHost {
            host: url.to_string(),
            source,
        })?;
        let origin = current.host_str().map(str::to_owned);
        let mut method = self.method;
        let mut body = self.body.clone();
        let mut block = Vec::new();
        let mut redirects = 0u32;

        let (status, content_type, payload) = loop {
            let same_host = current.host_str() == origin.as_deref();
            if !same_host && headers.iter().any(|h| h.is("Host")) {
                warn!("not forwarding Host header to {current}");
            }
            debug!("{method:?} {current}");
            let cookie = self.cookie_header(&current);
            let mut response = self.send(
                current.as_str(),
                method,
                body.as_deref(),
                headers,
                cookie.as_ref(),
                same_host,
            )?;
            write_hop(&mut block, &response);
            self.store_cookies(&response, &current);

            let status = response.status();
            let location = response
                .headers()
                .get(header::LOCATION)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

            match location {
                Some(location) if is_redirect(status) && redirects < self.max_redirects => {
                    read_body(&mut response)?;
                    let next = current
                        .join(&location)
                        .map_err(|source| ClientError::InvalidRedirect {
                            from: current.to_string(),
                            location: location.clone(),
                            source,
                        })?;
                    if status == StatusCode::SEE_OTHER
                        || (method == HttpMethod::Post
                            && (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND))
                    {
                        method = HttpMethod::Get;
                        body = None;
                    }
                    redirects += 1;
                    debug!("hop {redirects}: {} -> {next}", status.as_u16());
                    current = next;
                }
                location => {
                    if location.is_some() && is_redirect(status) {
                        debug!("redirect limit of {} reached at {current}", self.max_redirects);
                    }
                    let content_type = response
                        .headers()
                        .get(header::CONTENT_TYPE)
                        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
                    let payload = read_body(&mut response)?;
                    break (status, content_type, payload);
                }
            }
        };

        let header_size = block.len();
        let mut data = block;
        data.extend_from_slice(&payload);
        Ok(RawResponse {
            data,
            info: TransferInfo {
                url: current.to_string(),
                http_code: status.as_u16(),
                header_size,
                redirect_count: redirects,
                content_type,
                total_time: started.elapsed().as_secs_f64(),
            },
        })
    }

    fn close(&mut self) -> Result<(), ClientError> {
        debug!("closing transport");
        self.save_cookies()
    }
}

impl UreqTransport {
    /// Rebuild the agent if TLS or timeout settings changed, then load the
    /// cookie jar if one was configured and not read yet.
    fn prepare_agent(&mut self) -> Result<(), ClientError> {
        if self.agent_stale {
            self.agent = build_agent(self.verify_tls, self.connect_timeout);
            self.agent_stale = false;
            debug!(
                "rebuilt agent (verify_tls={}, connect_timeout={:?})",
                self.verify_tls, self.connect_timeout
            );
        }

        if !self.jar_loaded {
            if let Some(path) = &self.cookie_jar {
                if path.exists() {
                    let file = File::open(path).map_err(|source| ClientError::CookieJar {
                        path: path.clone(),
                        source,
                    })?;
                    self.cookies = cookie_store::serde::json::load(BufReader::new(file)).map_err(|e| {
                        ClientError::CookieFormat {
                            path: path.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    debug!("loaded cookies from {}", path.display());
                }
            }
            self.jar_loaded = true;
        }
        Ok(())
    }

    /// Write every cookie, session ones included, to the jar file.
    fn save_cookies(&self) -> Result<(), ClientError> {
        let Some(path) = &self.cookie_jar else {
            return Ok(());
        };
        let mut file = File::create(path).map_err(|source| ClientError::CookieJar {
            path: path.clone(),
            source,
        })?;
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&self.cookies, &mut file)
            .map_err(|e| ClientError::CookieFormat {
                path: path.clone(),
                message: e.to_string(),
            })?;
        debug!("saved cookies to {}", path.display());
        Ok(())
    }

    /// `Cookie` header for `url`: bare `name=value` pairs joined by `; `.
    fn cookie_header(&self, url: &Url) -> Option<HeaderLine> {
        let value = self
            .cookies
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if value.is_empty() {
            None
        } else {
            Some(HeaderLine::new("Cookie", value))
        }
    }

    fn store_cookies(&mut self, response: &Response<Body>, url: &Url) {
        let cookies: Vec<cookie::Cookie<'static>> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| match cookie::Cookie::parse(v) {
                Ok(c) => Some(c.into_owned()),
                Err(e) => {
                    debug!("ignoring Set-Cookie {v:?}: {e}");
                    None
                }
            })
            .collect();
        if !cookies.is_empty() {
            self.cookies.store_response_cookies(cookies.into_iter(), url);
        }
    }

    fn send(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&str>,
        headers: &[HeaderLine],
        cookie: Option<&HeaderLine>,
        same_host: bool,
    ) -> Result<Response<Body>, ClientError> {
        let mut headers: Vec<&HeaderLine> = headers
            .iter()
            .filter(|h| same_host || !h.is("Host"))
            .collect();
        headers.extend(cookie);

        let response = match (method, body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), &headers).call()?,
            (HttpMethod::Post, Some(body)) => {
                let mut request = with_headers(self.agent.post(url), &headers);
                if !headers.iter().any(|h| h.is("Content-Type")) {
                    request = request.content_type(FORM_CONTENT_TYPE);
                }
                request.send(body.as_bytes())?
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), &headers).send_empty()?,
        };
        Ok(response)
    }
}

fn build_agent(verify_tls: bool, connect_timeout: Option<Duration>) -> Agent {
    let tls = TlsConfig::builder()
        .disable_verification(!verify_tls)
        .build();
    Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .timeout_connect(connect_timeout)
        .tls_config(tls)
        .build()
        .new_agent()
}

fn with_headers<B>(mut request: RequestBuilder<B>, headers: &[&HeaderLine]) -> RequestBuilder<B> {
    for h in headers {
        request = request.header(h.name.as_str(), h.value.as_str());
    }
    request
}

/// Read a whole body. Pages are not size-capped.
fn read_body(response: &mut Response<Body>) -> Result<Vec<u8>, ClientError> {
    Ok(response.body_mut().with_config().limit(u64::MAX).read_to_vec()?)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "HTTP/0.9"
    } else if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else if version == Version::HTTP_2 {
        "HTTP/2"
    } else if version == Version::HTTP_3 {
        "HTTP/3"
    } else {
        "HTTP/1.1"
    }
}

/// Append one hop's status line and headers, terminated by a blank line.
fn write_hop(block: &mut Vec<u8>, response: &Response<Body>) {
    block.extend_from_slice(status_line(response.version(), response.status()).as_bytes());
    block.extend_from_slice(b"\r\n");
    for (name, value) in response.headers() {
        block.extend_from_slice(name.as_str().as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value.as_bytes());
        block.extend_from_slice(b"\r\n");
    }
    block.extend_from_slice(b"\r\n");
}

fn status_line(version: Version, status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {} {reason}", version_label(version), status.as_u16()),
        None => format!("{} {}", version_label(version), status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_uses_canonical_reason() {
        assert_eq!(status_line(Version::HTTP_11, StatusCode::FOUND), "HTTP/1.1 302 Found");
        assert_eq!(status_line(Version::HTTP_10, StatusCode::OK), "HTTP/1.0 200 OK");
        assert_eq!(status_line(Version::HTTP_2, StatusCode::NOT_FOUND), "HTTP/2 404 Not Found");
    }

    #[test]
    fn status_line_without_reason() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(status_line(Version::HTTP_11, status), "HTTP/1.1 599");
    }

    #[test]
    fn only_location_bearing_codes_are_redirects() {
        for code in [301, 302, 303, 307, 308] {
            assert!(is_redirect(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [200, 300, 304, 400] {
            assert!(!is_redirect(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    #[test]
    fn tls_and_timeout_changes_mark_agent_stale() {
        let base = Url::parse("http://x.com").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        assert!(!transport.agent_stale);

        transport.set_tls_verification(true);
        assert!(!transport.agent_stale, "unchanged setting keeps the agent");

        transport.set_tls_verification(false);
        assert!(transport.agent_stale);
        assert!(!transport.verify_tls);

        transport.agent_stale = false;
        transport.set_connect_timeout(Duration::from_secs(5));
        assert!(transport.agent_stale);
        assert_eq!(transport.connect_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn method_and_body_are_stored_on_the_handle() {
        let base = Url::parse("http://x.com").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        transport.set_method(HttpMethod::Post);
        transport.set_body(Some("a=1".to_string()));
        transport.set_max_redirects(3);
        assert_eq!(transport.method, HttpMethod::Post);
        assert_eq!(transport.body.as_deref(), Some("a=1"));
        assert_eq!(transport.max_redirects, 3);
    }

    fn store(transport: &mut UreqTransport, set_cookie: &str, url: &Url) {
        let c = cookie::Cookie::parse(set_cookie.to_string()).unwrap();
        transport
            .cookies
            .store_response_cookies(std::iter::once(c), url);
    }

    #[test]
    fn cookie_header_sends_bare_pairs() {
        let base = Url::parse("http://x.com/").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        assert!(transport.cookie_header(&base).is_none());

        store(&mut transport, "sid=s1; Path=/; Max-Age=3600; HttpOnly", &base);
        let header = transport.cookie_header(&base).unwrap();
        assert_eq!(header, HeaderLine::new("Cookie", "sid=s1"));
    }

    #[test]
    fn cookie_header_respects_path() {
        let base = Url::parse("http://x.com/app/login").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        store(&mut transport, "a=1; Path=/app", &base);
        let other = Url::parse("http://x.com/other").unwrap();
        assert!(transport.cookie_header(&other).is_none());
        let inside = Url::parse("http://x.com/app/page").unwrap();
        assert_eq!(transport.cookie_header(&inside).unwrap().value, "a=1");
    }

    #[test]
    fn session_cookies_survive_agent_rebuild() {
        let base = Url::parse("http://x.com/").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        store(&mut transport, "sid=s1; Path=/", &base);
        transport.set_connect_timeout(Duration::from_secs(5));
        transport.set_tls_verification(false);
        transport.prepare_agent().unwrap();
        assert_eq!(transport.cookie_header(&base).unwrap().value, "sid=s1");
    }

    #[test]
    fn jar_file_keeps_session_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("jar.json");
        let base = Url::parse("http://x.com/").unwrap();

        let mut first = UreqTransport::open(&base).unwrap();
        first.set_cookie_jar(jar.clone());
        first.prepare_agent().unwrap();
        store(&mut first, "sid=s1; Path=/", &base);
        first.close().unwrap();
        assert!(jar.exists());

        let mut second = UreqTransport::open(&base).unwrap();
        second.set_cookie_jar(jar);
        second.prepare_agent().unwrap();
        assert_eq!(second.cookie_header(&base).unwrap().value, "sid=s1");
    }

    #[test]
    fn malformed_jar_file_is_a_cookie_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("jar.json");
        std::fs::write(&jar, "not json at all").unwrap();
        let base = Url::parse("http://x.com/").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        transport.set_cookie_jar(jar);
        let err = transport.prepare_agent().unwrap_err();
        assert!(matches!(err, ClientError::CookieFormat { .. }), "got {err}");
    }

    #[test]
    fn cookie_jar_is_loaded_lazily() {
        let base = Url::parse("http://x.com").unwrap();
        let mut transport = UreqTransport::open(&base).unwrap();
        transport.set_cookie_jar(PathBuf::from("/nonexistent/jar.json"));
        assert!(!transport.jar_loaded);
        transport.prepare_agent().unwrap();
        assert!(transport.jar_loaded);
    }
}
