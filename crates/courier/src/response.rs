//! Buffered HTTP responses.

use std::borrow::Cow;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Result;

/// A fully read HTTP response.
///
/// The body is buffered when the response arrives so the same response can be
/// logged, stored as the last response and inspected by the caller.
#[derive(Debug, Clone)]
pub struct Response {
    method: Method,
    status: StatusCode,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub(crate) async fn from_reqwest(method: Method, response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let url = response.url().clone();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Self {
            method,
            status,
            url,
            version,
            headers,
            body,
        })
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub(crate) fn new(status: u16, url: &str, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::GET,
            status: StatusCode::from_u16(status).unwrap(),
            url: Url::parse(url).unwrap(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Method of the request that produced this response.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Numeric response status.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Canonical reason phrase for the status, or an empty string for
    /// unregistered codes.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Final URL, after any redirects.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP version of the response.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the named header, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the status is 3xx.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }
}
