//! Secret values and credentials.
//!
//! A [`Secret`] is a value that must be usable for authentication but never
//! printed. Formatting a secret through `Display` or `Debug` yields a mask; the
//! raw value is only reachable through [`Secret::expose`].

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Placeholder printed in place of a secret value.
pub const MASK: &str = "<secret>";

/// A credential value that is masked in all formatted output.
///
/// # Examples
///
/// ```
/// use courier_common::Secret;
///
/// let password = Secret::new("hunter2");
/// assert_eq!(password.to_string(), "<secret>");
/// assert_eq!(format!("{password:?}"), "Secret(<secret>)");
/// assert_eq!(password.expose(), "hunter2");
/// ```
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Wraps a raw value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Reveals the raw value for use in a request.
    ///
    /// Callers must not log or display the returned string.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single credential component, either a plain string or a [`Secret`].
#[derive(Clone)]
pub enum Credential {
    /// A value that may appear in logs.
    Plain(String),
    /// A value that must never appear in logs.
    Secret(Secret),
}

impl Credential {
    /// Returns the raw value to send on the wire.
    #[must_use]
    pub fn reveal(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Secret(secret) => secret.expose(),
        }
    }

    /// Whether this credential is a secret.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Secret(secret) => f.debug_tuple("Secret").field(secret).finish(),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.write_str(value),
            Self::Secret(secret) => write!(f, "{secret}"),
        }
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

impl From<Secret> for Credential {
    fn from(value: Secret) -> Self {
        Self::Secret(value)
    }
}

/// Returns `true` if any of the given credentials is a secret.
pub fn contains_secrets<'a>(credentials: impl IntoIterator<Item = &'a Credential>) -> bool {
    credentials.into_iter().any(Credential::is_secret)
}
