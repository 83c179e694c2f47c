//! Resolution of request URIs against session base URLs.

use crate::session::Session;

/// Resolves `uri` against the base URL of `session`.
///
/// A missing session, or one with an empty base URL, leaves `uri` untouched.
/// See [`join_url`] for the joining rules.
#[must_use]
pub fn merge_url(session: Option<&Session>, uri: &str) -> String {
    join_url(session.map_or("", Session::url), uri)
}

/// Joins a base URL and a URI.
///
/// - an empty `base` yields `uri`
/// - an empty `uri` yields `base`
/// - an absolute `uri` (one carrying a `scheme://` prefix) replaces `base`
/// - otherwise the two are joined by exactly one `/`, and a trailing run of
///   slashes on `uri` collapses to a single one
///
/// # Examples
///
/// ```
/// use courier::url::join_url;
///
/// assert_eq!(join_url("http://www.domain.com/path/", "/endpoint"), "http://www.domain.com/path/endpoint");
/// assert_eq!(join_url("http://www.domain.com", "/endpoint//"), "http://www.domain.com/endpoint/");
/// assert_eq!(join_url("http://www.domain.com", "https://new.domain.com"), "https://new.domain.com");
/// ```
#[must_use]
pub fn join_url(base: &str, uri: &str) -> String {
    if base.is_empty() || is_absolute_url(uri) {
        return uri.to_string();
    }
    if uri.is_empty() {
        return base.to_string();
    }

    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        uri.trim_start_matches('/')
    );
    if uri.ends_with('/') {
        url.truncate(url.trim_end_matches('/').len());
        url.push('/');
    }
    url
}

/// Whether `uri` starts with a `scheme://` prefix.
///
/// The scheme must begin with an ASCII letter and contain only letters,
/// digits, `+`, `-` or `.`.
#[must_use]
pub fn is_absolute_url(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once("://") else {
        return false;
    };

    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Returns the path and query of `url`, as sent on the request line.
pub(crate) fn request_target(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_merge_url_with_none_session() {
        assert_eq!(merge_url(None, "http://thisisa.url"), "http://thisisa.url");
        assert_eq!(merge_url(None, "/relative"), "/relative");
    }

    #[test]
    fn test_join_with_session_url_only() {
        assert_eq!(join_url("http://www.domain.com", ""), "http://www.domain.com");
    }

    #[test]
    fn test_join_with_endpoint() {
        assert_eq!(
            join_url("http://www.domain.com", "endpoint"),
            "http://www.domain.com/endpoint"
        );
        assert_eq!(
            join_url("http://www.domain.com/", "endpoint"),
            "http://www.domain.com/endpoint"
        );
        assert_eq!(
            join_url("http://www.domain.com", "/endpoint"),
            "http://www.domain.com/endpoint"
        );
    }

    #[test]
    fn test_join_keeps_base_path() {
        assert_eq!(
            join_url("http://www.domain.com/path", "/endpoint"),
            "http://www.domain.com/path/endpoint"
        );
        assert_eq!(
            join_url("http://www.domain.com/path", "endpoint"),
            "http://www.domain.com/path/endpoint"
        );
        assert_eq!(
            join_url("http://www.domain.com/path/", "endpoint"),
            "http://www.domain.com/path/endpoint"
        );
    }

    #[test]
    fn test_join_collapses_slashes() {
        assert_eq!(
            join_url("http://www.domain.com//", "endpoint"),
            "http://www.domain.com/endpoint"
        );
        assert_eq!(
            join_url("http://www.domain.com", "/endpoint//"),
            "http://www.domain.com/endpoint/"
        );
        assert_eq!(join_url("http://www.domain.com", "/"), "http://www.domain.com/");
    }

    #[test]
    fn test_absolute_uri_overrides_base() {
        assert_eq!(
            join_url("http://www.domain.com", "https://new.domain.com"),
            "https://new.domain.com"
        );
        assert_eq!(join_url("", "https://new.domain.com"), "https://new.domain.com");
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("http://x"));
        assert!(is_absolute_url("svn+ssh://host/repo"));
        assert!(!is_absolute_url("/path?next=http://x"));
        assert!(!is_absolute_url("://x"));
        assert!(!is_absolute_url("1http://x"));
        assert!(!is_absolute_url("endpoint"));
    }

    #[test]
    fn test_request_target() {
        let url = url::Url::parse("http://localhost:5000/digest-auth/auth/u/p?a=1").unwrap();
        assert_eq!(request_target(&url), "/digest-auth/auth/u/p?a=1");

        let url = url::Url::parse("http://localhost:5000").unwrap();
        assert_eq!(request_target(&url), "/");
    }
}
