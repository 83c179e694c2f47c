//! Username/password authentication for HTTP requests.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::secret::{Credential, contains_secrets};

/// HTTP authentication scheme used to present an [`Auth`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum AuthScheme {
    /// RFC 7617 Basic authentication, sent preemptively.
    #[default]
    Basic,
    /// RFC 7616 Digest authentication, sent in answer to a challenge.
    Digest,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "Basic"),
            Self::Digest => write!(f, "Digest"),
        }
    }
}

/// A username/password pair and the scheme used to send it.
///
/// Either component may be a [`Secret`](crate::Secret).
///
/// # Examples
///
/// ```
/// use courier_common::{Auth, AuthScheme, Secret};
///
/// let auth = Auth::basic("user", Secret::new("passwd"));
/// assert!(auth.has_secrets());
/// assert_eq!(auth.scheme, AuthScheme::Basic);
/// assert_eq!(auth.basic_header_value(), "Basic dXNlcjpwYXNzd2Q=");
/// ```
#[derive(Debug, Clone)]
pub struct Auth {
    /// How the pair is presented to the server.
    pub scheme: AuthScheme,
    /// The username.
    pub username: Credential,
    /// The password.
    pub password: Credential,
}

impl Auth {
    /// Creates a Basic auth pair.
    pub fn basic(username: impl Into<Credential>, password: impl Into<Credential>) -> Self {
        Self {
            scheme: AuthScheme::Basic,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates a Digest auth pair.
    pub fn digest(username: impl Into<Credential>, password: impl Into<Credential>) -> Self {
        Self {
            scheme: AuthScheme::Digest,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the same pair presented with another scheme.
    #[must_use]
    pub const fn with_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Whether the username or password is a secret.
    #[must_use]
    pub fn has_secrets(&self) -> bool {
        contains_secrets([&self.username, &self.password])
    }

    /// Returns the raw `(username, password)` pair for use on the wire.
    #[must_use]
    pub fn reveal(&self) -> (&str, &str) {
        (self.username.reveal(), self.password.reveal())
    }

    /// Builds the value of a Basic `Authorization` header.
    #[must_use]
    pub fn basic_header_value(&self) -> String {
        let (username, password) = self.reveal();
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }
}

/// Decodes a Basic `Authorization` header value into `(username, password)`.
///
/// Returns `None` if the header is not Basic, is not valid base64, or does
/// not contain a `:` separator.
#[must_use]
pub fn parse_basic_header(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some((username.to_string(), password.to_string()))
}
