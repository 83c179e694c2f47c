//! Expected-status assertions.

use std::fmt;
use std::str::FromStr;

use reqwest::StatusCode;

use crate::error::{KeywordError, Result};
use crate::response::Response;

/// The status a caller expects a response to carry.
///
/// Parsed from a decimal code (`"201"`), a reason phrase matched
/// case-insensitively (`"created"`, `"Not Found"`, `"I'm a teapot"`), or
/// `"any"`/`"anything"` to accept every status.
///
/// # Examples
///
/// ```
/// use courier::ExpectedStatus;
/// use reqwest::StatusCode;
///
/// let expected: ExpectedStatus = "not found".parse().unwrap();
/// assert_eq!(expected, ExpectedStatus::Code(StatusCode::NOT_FOUND));
/// assert_eq!("ANYTHING".parse::<ExpectedStatus>().unwrap(), ExpectedStatus::Any);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    /// Every status passes, including errors.
    Any,
    /// Only this exact status passes.
    Code(StatusCode),
}

impl ExpectedStatus {
    /// Checks a response status against this expectation.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError::StatusMismatch`] when the codes differ.
    pub fn check(&self, response: &Response, msg: Option<&str>) -> Result<()> {
        match self {
            Self::Any => Ok(()),
            Self::Code(expected) if *expected == response.status() => Ok(()),
            Self::Code(expected) => Err(KeywordError::StatusMismatch {
                msg: msg.map(str::to_string),
                url: response.url().to_string(),
                actual: response.status_code(),
                expected: expected.as_u16(),
            }),
        }
    }
}

impl FromStr for ExpectedStatus {
    type Err = KeywordError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || KeywordError::InvalidExpectedStatus(s.to_string());

        if trimmed.eq_ignore_ascii_case("any") || trimmed.eq_ignore_ascii_case("anything") {
            return Ok(Self::Any);
        }

        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let code = trimmed.parse::<u16>().map_err(|_| invalid())?;
            return StatusCode::from_u16(code).map(Self::Code).map_err(|_| invalid());
        }

        let wanted = normalize_status_name(trimmed);
        (100..600)
            .filter_map(|code| StatusCode::from_u16(code).ok())
            .find(|status| {
                status
                    .canonical_reason()
                    .is_some_and(|reason| normalize_status_name(reason) == wanted)
            })
            .map(Self::Code)
            .ok_or_else(invalid)
    }
}

impl TryFrom<u16> for ExpectedStatus {
    type Error = KeywordError;

    fn try_from(code: u16) -> Result<Self> {
        StatusCode::from_u16(code)
            .map(Self::Code)
            .map_err(|_| KeywordError::InvalidExpectedStatus(code.to_string()))
    }
}

impl From<StatusCode> for ExpectedStatus {
    fn from(status: StatusCode) -> Self {
        Self::Code(status)
    }
}

impl fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Code(status) => write!(f, "{}", status.as_u16()),
        }
    }
}

/// Fails if the response status is 4xx or 5xx.
///
/// # Errors
///
/// Returns [`KeywordError::HttpError`] carrying the status, reason and URL.
pub fn raise_for_status(response: &Response) -> Result<()> {
    let status = response.status();
    let kind = if status.is_client_error() {
        "Client"
    } else if status.is_server_error() {
        "Server"
    } else {
        return Ok(());
    };

    Err(KeywordError::HttpError {
        status: status.as_u16(),
        kind,
        reason: response.reason().to_string(),
        url: response.url().to_string(),
    })
}

/// Applies the status rule of a keyword call.
///
/// With no expectation the response must not be an error; otherwise it must
/// match the expectation.
///
/// # Errors
///
/// See [`raise_for_status`] and [`ExpectedStatus::check`].
pub fn check_status(
    expected: Option<&ExpectedStatus>,
    response: &Response,
    msg: Option<&str>,
) -> Result<()> {
    match expected {
        None => raise_for_status(response),
        Some(expected) => expected.check(response, msg),
    }
}

fn normalize_status_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\'')
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
