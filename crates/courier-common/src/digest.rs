//! HTTP Digest authentication (RFC 7616).
//!
//! Both sides of the exchange live here: clients parse a
//! [`DigestChallenge`] from `WWW-Authenticate` and answer it with
//! [`DigestChallenge::respond`], servers parse [`DigestCredentials`] from
//! `Authorization` and check them with [`DigestCredentials::verify`].
//!
//! Supported algorithms are MD5, SHA-256 and SHA-512. Session variants
//! (`-sess`) are not supported. Quality of protection may be `auth`,
//! `auth-int`, or absent (RFC 2069 compatibility).

use std::fmt::{self, Write as _};
use std::str::FromStr;

use log::debug;
use md5::{Digest, Md5};
use sha2::{Sha256, Sha512};
use thiserror::Error;

/// Nonce count sent with every answer. Each challenge is answered once.
const NONCE_COUNT: &str = "00000001";

/// Errors raised while parsing Digest headers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DigestError {
    /// The header does not use the Digest scheme.
    #[error("Not a Digest header: {0}")]
    NotDigest(String),

    /// A required parameter is missing.
    #[error("Missing digest parameter: {0}")]
    MissingParameter(&'static str),

    /// The algorithm is not one of MD5, SHA-256 or SHA-512.
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The quality of protection is not `auth` or `auth-int`.
    #[error("Unsupported quality of protection: {0}")]
    UnsupportedQop(String),
}

/// Hash algorithm used to compute digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// MD5, the RFC 2617 default.
    #[default]
    Md5,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the token used in headers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Hashes `data` and returns the lowercase hex digest.
    #[must_use]
    pub fn hash(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => to_hex(&Md5::digest(data)),
            Self::Sha256 => to_hex(&Sha256::digest(data)),
            Self::Sha512 => to_hex(&Sha512::digest(data)),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA-256" | "SHA256" => Ok(Self::Sha256),
            "SHA-512" | "SHA512" => Ok(Self::Sha512),
            _ => Err(DigestError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Quality of protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestQop {
    /// Authentication only.
    Auth,
    /// Authentication with integrity protection of the request body.
    AuthInt,
}

impl DigestQop {
    /// Returns the token used in headers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::AuthInt => "auth-int",
        }
    }
}

impl fmt::Display for DigestQop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestQop {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" => Ok(Self::Auth),
            "auth-int" => Ok(Self::AuthInt),
            _ => Err(DigestError::UnsupportedQop(s.to_string())),
        }
    }
}

/// The request being authenticated.
#[derive(Debug, Clone, Copy)]
pub struct DigestRequest<'a> {
    /// HTTP method, e.g. `GET`.
    pub method: &'a str,
    /// Request target: path plus optional query.
    pub uri: &'a str,
    /// Request body. Only used for `auth-int`.
    pub body: &'a [u8],
}

/// A Digest challenge, as sent in `WWW-Authenticate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection space.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value echoed back by the client.
    pub opaque: Option<String>,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Offered qualities of protection. Empty means RFC 2069 mode.
    pub qop: Vec<DigestQop>,
    /// Whether the previous nonce was rejected as stale.
    pub stale: bool,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Unknown qop tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is not Digest, `realm` or `nonce` is
    /// missing, or the algorithm is unsupported.
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let params = digest_params(header)?;

        let realm = find_param(&params, "realm").ok_or(DigestError::MissingParameter("realm"))?;
        let nonce = find_param(&params, "nonce").ok_or(DigestError::MissingParameter("nonce"))?;
        let algorithm = find_param(&params, "algorithm")
            .map(str::parse::<DigestAlgorithm>)
            .transpose()?
            .unwrap_or_default();

        let qop = find_param(&params, "qop")
            .map(|offered| {
                offered
                    .split(',')
                    .filter_map(|token| match token.parse::<DigestQop>() {
                        Ok(qop) => Some(qop),
                        Err(e) => {
                            debug!("Ignoring offered qop: {e}");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stale = find_param(&params, "stale").is_some_and(|s| s.eq_ignore_ascii_case("true"));

        Ok(Self {
            realm: realm.to_string(),
            nonce: nonce.to_string(),
            opaque: find_param(&params, "opaque").map(str::to_string),
            algorithm,
            qop,
            stale,
        })
    }

    /// Answers the challenge with a fresh client nonce.
    #[must_use]
    pub fn respond(
        &self,
        request: &DigestRequest<'_>,
        username: &str,
        password: &str,
    ) -> DigestCredentials {
        self.respond_with_cnonce(request, username, password, &generate_cnonce())
    }

    /// Answers the challenge with the given client nonce.
    ///
    /// `auth` is preferred over `auth-int` when the server offers both.
    #[must_use]
    pub fn respond_with_cnonce(
        &self,
        request: &DigestRequest<'_>,
        username: &str,
        password: &str,
        cnonce: &str,
    ) -> DigestCredentials {
        let qop = if self.qop.contains(&DigestQop::Auth) {
            Some(DigestQop::Auth)
        } else {
            self.qop.first().copied()
        };

        let mut credentials = DigestCredentials {
            username: username.to_string(),
            realm: self.realm.clone(),
            nonce: self.nonce.clone(),
            uri: request.uri.to_string(),
            response: String::new(),
            algorithm: self.algorithm,
            opaque: self.opaque.clone(),
            qop,
            nc: qop.map(|_| NONCE_COUNT.to_string()),
            cnonce: qop.map(|_| cnonce.to_string()),
        };
        credentials.response = credentials.expected_response(password, request.method, request.body);
        credentials
    }

    /// Renders the challenge as a `WWW-Authenticate` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            "Digest realm=\"{}\", nonce=\"{}\"",
            quote(&self.realm),
            quote(&self.nonce)
        );
        if let Some(ref opaque) = self.opaque {
            let _ = write!(header, ", opaque=\"{}\"", quote(opaque));
        }
        if !self.qop.is_empty() {
            let offered: Vec<&str> = self.qop.iter().map(DigestQop::as_str).collect();
            let _ = write!(header, ", qop=\"{}\"", offered.join(","));
        }
        let _ = write!(header, ", algorithm={}", self.algorithm);
        if self.stale {
            header.push_str(", stale=TRUE");
        }
        header
    }
}

impl fmt::Display for DigestChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Digest credentials, as sent in `Authorization`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredentials {
    /// Username.
    pub username: String,
    /// Protection space copied from the challenge.
    pub realm: String,
    /// Server nonce copied from the challenge.
    pub nonce: String,
    /// Request target the digest covers.
    pub uri: String,
    /// Hex digest proving knowledge of the password.
    pub response: String,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Opaque value copied from the challenge.
    pub opaque: Option<String>,
    /// Selected quality of protection.
    pub qop: Option<DigestQop>,
    /// Nonce count, present with a qop.
    pub nc: Option<String>,
    /// Client nonce, present with a qop.
    pub cnonce: Option<String>,
}

impl DigestCredentials {
    /// Parses an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is not Digest, a required parameter is
    /// missing, or the algorithm or qop is unsupported.
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let params = digest_params(header)?;
        let required = |name: &'static str| {
            find_param(&params, name)
                .map(str::to_string)
                .ok_or(DigestError::MissingParameter(name))
        };

        let qop = find_param(&params, "qop")
            .map(str::parse::<DigestQop>)
            .transpose()?;
        let (nc, cnonce) = if qop.is_some() {
            (Some(required("nc")?), Some(required("cnonce")?))
        } else {
            (None, None)
        };

        Ok(Self {
            username: required("username")?,
            realm: required("realm")?,
            nonce: required("nonce")?,
            uri: required("uri")?,
            response: required("response")?,
            algorithm: find_param(&params, "algorithm")
                .map(str::parse::<DigestAlgorithm>)
                .transpose()?
                .unwrap_or_default(),
            opaque: find_param(&params, "opaque").map(str::to_string),
            qop,
            nc,
            cnonce,
        })
    }

    /// Computes the response digest these credentials should carry.
    #[must_use]
    pub fn expected_response(&self, password: &str, method: &str, body: &[u8]) -> String {
        let hash = |data: &str| self.algorithm.hash(data.as_bytes());

        let ha1 = hash(&format!("{}:{}:{password}", self.username, self.realm));
        let ha2 = match self.qop {
            Some(DigestQop::AuthInt) => hash(&format!(
                "{method}:{}:{}",
                self.uri,
                self.algorithm.hash(body)
            )),
            _ => hash(&format!("{method}:{}", self.uri)),
        };

        match (self.qop, &self.nc, &self.cnonce) {
            (Some(qop), Some(nc), Some(cnonce)) => {
                hash(&format!("{ha1}:{}:{nc}:{cnonce}:{qop}:{ha2}", self.nonce))
            }
            _ => hash(&format!("{ha1}:{}:{ha2}", self.nonce)),
        }
    }

    /// Checks the response digest against the expected password.
    #[must_use]
    pub fn verify(&self, password: &str, method: &str, body: &[u8]) -> bool {
        let expected = self.expected_response(password, method, body);
        constant_time_eq(expected.as_bytes(), self.response.to_ascii_lowercase().as_bytes())
    }

    /// Renders the credentials as an `Authorization` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            quote(&self.username),
            quote(&self.realm),
            quote(&self.nonce),
            quote(&self.uri),
            self.algorithm,
            self.response
        );
        if let Some(ref opaque) = self.opaque {
            let _ = write!(header, ", opaque=\"{}\"", quote(opaque));
        }
        if let (Some(qop), Some(nc), Some(cnonce)) = (self.qop, &self.nc, &self.cnonce) {
            let _ = write!(header, ", qop={qop}, nc={nc}, cnonce=\"{}\"", quote(cnonce));
        }
        header
    }
}

impl fmt::Display for DigestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Generates a random 128-bit client nonce as hex.
#[must_use]
pub fn generate_cnonce() -> String {
    to_hex(&rand::random::<[u8; 16]>())
}

/// Parses `key=value` and `key="quoted value"` pairs separated by commas.
///
/// Keys are lowercased. Backslash escapes inside quoted values are honoured.
/// Tokens without `=` are skipped.
#[must_use]
pub fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value.truncate(value.trim_end().len());
        }

        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}

fn digest_params(header: &str) -> Result<Vec<(String, String)>, DigestError> {
    let header = header.trim();
    match header.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => Ok(parse_params(rest)),
        _ => Err(DigestError::NotDigest(header.to_string())),
    }
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
