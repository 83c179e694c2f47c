//! Snapshots of incoming requests, rendered back to the client as JSON.

use std::net::SocketAddr;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, FromRequest, Multipart, Request};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_TYPE, HOST};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EchoError, Result};

/// Largest request body the server reads.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Proxy and platform headers hidden unless `show_env` is in the query.
const ENV_HEADERS: [&str; 15] = [
    "X-Varnish",
    "X-Request-Start",
    "X-Heroku-Queue-Depth",
    "X-Real-Ip",
    "X-Forwarded-Proto",
    "X-Forwarded-Protocol",
    "X-Forwarded-Ssl",
    "X-Heroku-Queue-Wait-Time",
    "X-Forwarded-For",
    "X-Heroku-Dynos-In-Use",
    "X-Forwarded-Port",
    "X-Request-Id",
    "Via",
    "Total-Route-Time",
    "Connect-Time",
];

/// Everything the `/anything` endpoint reflects.
///
/// Fields are declared in the order they are rendered.
#[derive(Debug, Serialize)]
pub struct RequestInfo {
    pub args: Map<String, Value>,
    pub data: String,
    pub files: Map<String, Value>,
    pub form: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub json: Value,
    pub method: String,
    pub origin: String,
    pub url: String,
}

impl RequestInfo {
    /// Reads the request, including its body.
    ///
    /// # Errors
    ///
    /// Returns [`EchoError::BadRequest`] if the body is too large or a
    /// multipart body is malformed.
    pub async fn from_request(request: Request) -> Result<Self> {
        let query = query_pairs(request.uri().query());
        let show_env = query.iter().any(|(key, _)| key == "show_env");
        let headers = request.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let mut info = Self {
            args: semiflatten(query),
            data: String::new(),
            files: Map::new(),
            form: Map::new(),
            headers: headers_json(&headers, show_env),
            json: Value::Null,
            method: request.method().to_string(),
            origin: origin(&headers, remote),
            url: request_url(&headers, request.uri()),
        };

        if content_type.starts_with("multipart/form-data") {
            info.read_multipart(request).await?;
        } else {
            let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
                .await
                .map_err(|e| EchoError::BadRequest(format!("Failed to read body: {e}")))?;

            if content_type.starts_with("application/x-www-form-urlencoded") {
                info.form = semiflatten(
                    url::form_urlencoded::parse(&body)
                        .into_owned()
                        .collect(),
                );
            } else {
                info.data = json_safe(&body, "application/octet-stream");
            }
            info.json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        }

        Ok(info)
    }

    async fn read_multipart(&mut self, request: Request) -> Result<()> {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| EchoError::BadRequest(e.body_text()))?;

        let mut fields = Vec::new();
        let mut files = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| EchoError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| EchoError::BadRequest(e.body_text()))?;

            if is_file {
                files.push((name, json_safe(&content, &content_type)));
            } else {
                fields.push((name, String::from_utf8_lossy(&content).into_owned()));
            }
        }

        self.form = semiflatten(fields);
        self.files = semiflatten(files);
        Ok(())
    }
}

/// Renders request headers with title-cased names.
///
/// Proxy and platform headers are dropped unless `show_env` is set. Repeated
/// headers are joined with `,`.
pub fn headers_json(headers: &HeaderMap, show_env: bool) -> Map<String, Value> {
    let mut out: Map<String, Value> = Map::new();

    for (name, value) in headers {
        let name = title_case(name.as_str());
        if !show_env && ENV_HEADERS.iter().any(|env| env.eq_ignore_ascii_case(&name)) {
            continue;
        }

        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match out.get_mut(&name) {
            Some(Value::String(existing)) => {
                existing.push(',');
                existing.push_str(&value);
            }
            _ => {
                out.insert(name, Value::String(value));
            }
        }
    }

    out
}

/// Whether `show_env` appears in the query string.
pub fn wants_env(query: Option<&str>) -> bool {
    query_pairs(query).iter().any(|(key, _)| key == "show_env")
}

fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query.map_or_else(Vec::new, |query| {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    })
}

/// Groups pairs by key: single values stay strings, repeated keys become
/// lists in arrival order.
pub fn semiflatten(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut out = Map::new();

    for (key, value) in pairs {
        match out.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                out.insert(key, Value::String(value));
            }
        }
    }

    out
}

/// Returns UTF-8 data unchanged, and anything else as a base64 `data:` URL.
pub fn json_safe(data: &[u8], content_type: &str) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("data:{content_type};base64,{}", STANDARD.encode(data)),
    }
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn origin(headers: &HeaderMap, remote: Option<String>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(remote)
        .unwrap_or_default()
}

/// Rebuilds the URL the client used, honouring proxy protocol headers.
fn request_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    let scheme = header("x-forwarded-proto")
        .or_else(|| header("x-forwarded-protocol"))
        .or_else(|| (header("x-forwarded-ssl") == Some("on")).then_some("https"))
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = header(HOST.as_str())
        .or_else(|| uri.authority().map(axum::http::uri::Authority::as_str))
        .unwrap_or("localhost");
    let path = uri
        .path_and_query()
        .map_or("/", axum::http::uri::PathAndQuery::as_str);

    format!("{scheme}://{host}{path}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_semiflatten() {
        let pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "3".to_string()),
            ("a".to_string(), "4".to_string()),
        ];
        assert_eq!(
            Value::Object(semiflatten(pairs)),
            json!({"a": ["1", "3", "4"], "b": "2"})
        );
        assert!(semiflatten(Vec::new()).is_empty());
    }

    #[test]
    fn test_json_safe() {
        assert_eq!(json_safe(b"hello", "text/plain"), "hello");
        assert_eq!(
            json_safe(&[0xff, 0xfe], "application/octet-stream"),
            "data:application/octet-stream;base64,//4="
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("content-type"), "Content-Type");
        assert_eq!(title_case("x-forwarded-for"), "X-Forwarded-For");
        assert_eq!(title_case("accept"), "Accept");
    }

    #[test]
    fn test_headers_hide_env() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));

        let hidden = headers_json(&headers, false);
        assert!(!hidden.contains_key("X-Forwarded-For"));
        assert_eq!(hidden["Accept"], "*/*");
        assert_eq!(hidden["X-Multi"], "a,b");

        let shown = headers_json(&headers, true);
        assert_eq!(shown["X-Forwarded-For"], "10.0.0.1");
    }

    #[test]
    fn test_wants_env() {
        assert!(wants_env(Some("a=1&show_env=1")));
        assert!(wants_env(Some("show_env")));
        assert!(!wants_env(Some("a=1")));
        assert!(!wants_env(None));
    }

    #[test]
    fn test_request_url() {
        let uri: axum::http::Uri = "/anything?a=1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:5000"));
        assert_eq!(
            request_url(&headers, &uri),
            "http://localhost:5000/anything?a=1"
        );

        headers.insert("x-forwarded-ssl", HeaderValue::from_static("on"));
        assert_eq!(
            request_url(&headers, &uri),
            "https://localhost:5000/anything?a=1"
        );

        headers.insert("x-forwarded-protocol", HeaderValue::from_static("ftp"));
        assert_eq!(
            request_url(&headers, &uri),
            "ftp://localhost:5000/anything?a=1"
        );
    }

    #[test]
    fn test_origin() {
        let mut headers = HeaderMap::new();
        assert_eq!(origin(&headers, Some("127.0.0.1".to_string())), "127.0.0.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(origin(&headers, Some("127.0.0.1".to_string())), "10.0.0.1");
    }
}
