use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw: method, headers in arrival order, and the raw body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// All values received for `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/hello", get(hello))
        .route("/echo", any(echo))
        .route("/redirect/{hops}", get(redirect_chain))
        .route("/moved", get(moved))
        .route("/login", post(login))
        .route("/keep-post", post(keep_post))
        .route("/dup-headers", get(dup_headers))
        .route("/cookies", get(show_cookies))
        .route("/cookies/set", get(set_cookie))
        .route("/cookies/session", get(set_session_cookie))
        .route("/cookies/redirect", get(set_cookie_and_redirect))
        .route("/big/{mib}", get(big))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn root() -> &'static str {
    "root"
}

async fn hello() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<h1>hello</h1>",
    )
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        body,
    })
}

/// `302` down to `/redirect/0`, which answers `200`.
async fn redirect_chain(Path(hops): Path<u32>) -> Response {
    if hops == 0 {
        return (StatusCode::OK, "landed").into_response();
    }
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, format!("/redirect/{}", hops - 1)),
            (header::HeaderName::from_static("x-hop"), hops.to_string()),
        ],
    )
        .into_response()
}

async fn moved() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/hello")])
}

async fn login() -> Redirect {
    Redirect::to("/echo")
}

async fn keep_post() -> Redirect {
    Redirect::temporary("/echo")
}

async fn dup_headers() -> impl IntoResponse {
    (
        AppendHeaders([("x-dup", "first"), ("x-dup", "second")]),
        "dup",
    )
}

async fn set_cookie() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, "session=abc123; Max-Age=3600; Path=/")],
        "set",
    )
}

async fn set_session_cookie() -> impl IntoResponse {
    ([(header::SET_COOKIE, "sid=s1; Path=/")], "session")
}

async fn set_cookie_and_redirect() -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, "hop=1; Path=/"),
            (header::LOCATION, "/cookies"),
        ],
    )
}

/// `mib` MiB of `a`.
async fn big(Path(mib): Path<usize>) -> Vec<u8> {
    vec![b'a'; mib * 1024 * 1024]
}

async fn show_cookies(headers: HeaderMap) -> String {
    headers
        .get_all(header::COOKIE)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join("; ")
}
