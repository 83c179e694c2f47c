//! Request and response log lines.

use std::fmt::Write;

use log::info;
use reqwest::header::{AUTHORIZATION, HeaderMap, PROXY_AUTHORIZATION};

use crate::response::Response;
use crate::url::request_target;

/// Replacement for credential header values in redacted logs.
pub const REDACTED: &str = "*****";

pub(crate) fn log_request(request: &reqwest::Request, redact: bool) {
    info!("{}", format_request(request, redact));
}

pub(crate) fn log_response(response: &Response, redact: bool) {
    info!("{}", format_response(response, redact));
}

pub(crate) fn format_request(request: &reqwest::Request, redact: bool) -> String {
    let body = match request.body() {
        None => "None".to_string(),
        Some(body) => body.as_bytes().map_or_else(
            || "<streaming body>".to_string(),
            |bytes| String::from_utf8_lossy(bytes).into_owned(),
        ),
    };

    format!(
        "{} Request : url={} \n path_url={} \n headers={} \n body={} \n ",
        request.method(),
        request.url(),
        request_target(request.url()),
        format_headers(request.headers(), redact),
        body
    )
}

pub(crate) fn format_response(response: &Response, redact: bool) -> String {
    format!(
        "{} Response : url={} \n status={}, reason={} \n headers={} \n body={} \n ",
        response.method(),
        response.url(),
        response.status_code(),
        response.reason(),
        format_headers(response.headers(), redact),
        response.text()
    )
}

/// Renders headers as `{'Name': 'value', ...}`, masking credentials when
/// `redact` is set.
pub(crate) fn format_headers(headers: &HeaderMap, redact: bool) -> String {
    let mut out = String::from("{");

    for (i, (name, value)) in headers.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let value = if redact && (name == AUTHORIZATION || name == PROXY_AUTHORIZATION) {
            REDACTED.into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        let _ = write!(out, "'{name}': '{value}'");
    }

    out.push('}');
    out
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use reqwest::header::HeaderValue;

    use super::*;

    fn request_with_auth() -> reqwest::Request {
        reqwest::Client::new()
            .post("http://localhost:5000/anything?a=1")
            .basic_auth("user", Some("passwd"))
            .header(PROXY_AUTHORIZATION, "Basic cHJveHk6cHJveHk=")
            .body("payload")
            .build()
            .unwrap()
    }

    #[test]
    fn test_format_request_redacts_credentials() {
        let line = format_request(&request_with_auth(), true);

        assert!(line.starts_with("POST Request : url=http://localhost:5000/anything?a=1"));
        assert!(line.contains("path_url=/anything?a=1"));
        assert!(line.contains("'authorization': '*****'"));
        assert!(line.contains("'proxy-authorization': '*****'"));
        assert!(!line.contains("dXNlcjpwYXNzd2Q="));
        assert!(line.contains("body=payload"));
    }

    #[test]
    fn test_format_request_without_redaction() {
        let line = format_request(&request_with_auth(), false);
        assert!(line.contains("'authorization': 'Basic dXNlcjpwYXNzd2Q='"));
    }

    #[test]
    fn test_format_request_without_body() {
        let request = reqwest::Client::new()
            .get("http://localhost:5000/")
            .build()
            .unwrap();
        assert!(format_request(&request, false).contains("body=None"));
    }

    #[test]
    fn test_format_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-one", HeaderValue::from_static("1"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token"));

        let rendered = format_headers(&headers, false);
        assert!(rendered.contains("'x-one': '1'"));
        assert!(rendered.contains("'authorization': 'Bearer token'"));
        assert!(format_headers(&headers, true).contains("'authorization': '*****'"));
        assert_eq!(format_headers(&HeaderMap::new(), true), "{}");
    }

    #[test]
    fn test_format_response() {
        let response = Response::new(404, "http://localhost/missing", "nope");
        let line = format_response(&response, false);
        assert!(line.starts_with("GET Response : url=http://localhost/missing"));
        assert!(line.contains("status=404, reason=Not Found"));
        assert!(line.contains("body=nope"));
    }
}
