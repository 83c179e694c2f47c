//! Per-call request options.

use std::fs;
use std::path::Path;

use bytes::Bytes;
use courier_common::Auth;
use typed_builder::TypedBuilder;

use crate::error::Result;
use crate::status::ExpectedStatus;

/// Converts `(key, value)` pairs of string-likes into owned pairs.
///
/// ```
/// let headers = courier::pairs([("Accept", "application/json")]);
/// assert_eq!(headers, vec![("Accept".to_string(), "application/json".to_string())]);
/// ```
pub fn pairs<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<String>,
{
    items
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// URL-encoded form fields, or multipart text fields when files are sent.
    Form(Vec<(String, String)>),
    /// Raw text sent as-is.
    Text(String),
    /// Raw bytes sent as-is.
    Bytes(Bytes),
    /// A JSON document; sets `Content-Type: application/json` unless a
    /// header overrides it.
    Json(serde_json::Value),
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

/// A file sent as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name sent in the part's `Content-Disposition`.
    pub file_name: Option<String>,
    /// Part content type.
    pub content_type: Option<String>,
    /// File content.
    pub content: Bytes,
}

impl FilePart {
    /// Creates a part from in-memory content.
    pub fn new(field: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: None,
            content_type: None,
            content: content.into(),
        }
    }

    /// Reads a part from disk, using the path's file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(field: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let part = Self::new(field, content);

        Ok(match path.file_name() {
            Some(name) => part.with_file_name(name.to_string_lossy()),
            None => part,
        })
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Options for a single keyword call.
///
/// ```
/// use courier::{ExpectedStatus, RequestBody, RequestOptions, pairs};
///
/// let options = RequestOptions::builder()
///     .params(pairs([("key", "value")]))
///     .body(RequestBody::Json(serde_json::json!({"name": "courier"})))
///     .expected_status(ExpectedStatus::Any)
///     .build();
/// assert_eq!(options.params.len(), 1);
/// ```
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct RequestOptions {
    /// Query parameters appended to the URL.
    #[builder(default)]
    pub params: Vec<(String, String)>,
    /// Request body.
    #[builder(default, setter(strip_option, into))]
    pub body: Option<RequestBody>,
    /// Multipart file parts.
    #[builder(default)]
    pub files: Vec<FilePart>,
    /// Headers; these override session headers of the same name.
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    /// Cookies sent with this call only.
    #[builder(default)]
    pub cookies: Vec<(String, String)>,
    /// Credentials for this call; these override session credentials.
    #[builder(default, setter(strip_option))]
    pub auth: Option<Auth>,
    /// Timeout in seconds.
    #[builder(default, setter(strip_option))]
    pub timeout: Option<f64>,
    /// Whether redirects are followed (default: true, false for HEAD).
    #[builder(default, setter(strip_option))]
    pub allow_redirects: Option<bool>,
    /// Status the response must carry.
    #[builder(default, setter(strip_option))]
    pub expected_status: Option<ExpectedStatus>,
    /// Message prepended to a status mismatch error.
    #[builder(default, setter(strip_option, into))]
    pub msg: Option<String>,
}

impl RequestOptions {
    /// Whether call-level credentials contain a secret.
    #[must_use]
    pub fn has_secrets(&self) -> bool {
        self.auth.as_ref().is_some_and(Auth::has_secrets)
    }
}
