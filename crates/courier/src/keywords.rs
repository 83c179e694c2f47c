//! The keyword surface: a session registry, request dispatch and status
//! assertions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use courier_common::{Auth, AuthScheme};
use log::{debug, info};
use reqwest::Method;
use uuid::Uuid;

use crate::config::LibraryConfig;
use crate::error::{KeywordError, Result};
use crate::request::RequestOptions;
use crate::response::Response;
use crate::session::{ClientCert, Session, SessionOptions};
use crate::status::{ExpectedStatus, check_status, raise_for_status};
use crate::transport::{ClientSettings, Outgoing, Transport};
use crate::url::merge_url;

/// HTTP keywords with an alias-keyed session registry.
///
/// Every call runs to completion before the next one starts; the registry is
/// only reachable through `&mut self`.
///
/// ```no_run
/// use courier::{KeywordLibrary, RequestOptions, SessionOptions};
/// use courier_common::{Auth, Secret};
///
/// # async fn example() -> courier::Result<()> {
/// let mut library = KeywordLibrary::new()?;
/// library.create_session(
///     "httpbin",
///     "http://localhost:5000",
///     SessionOptions::builder()
///         .auth(Auth::basic("user", Secret::new("passwd")))
///         .build(),
/// )?;
///
/// let response = library
///     .get_on_session("httpbin", "/basic-auth/user/passwd", RequestOptions::default())
///     .await?;
/// assert!(library.request_has_secrets());
/// library.status_should_be(&"OK".parse()?, Some(&response), None)?;
/// # Ok(())
/// # }
/// ```
pub struct KeywordLibrary {
    config: LibraryConfig,
    sessions: HashMap<String, Session>,
    session_secrets: HashMap<Uuid, bool>,
    sessionless: Transport,
    last_response: Option<Response>,
    request_has_secrets: bool,
}

impl KeywordLibrary {
    /// Creates a library with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::with_config(LibraryConfig::default())
    }

    /// Creates a library whose sessions and sessionless requests start from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialised.
    pub fn with_config(config: LibraryConfig) -> Result<Self> {
        config.validate()?;

        let settings = ClientSettings {
            accept_invalid_certs: !config.verify,
            ..ClientSettings::default()
        };
        let sessionless = Transport::new(&settings, config.retry.clone(), config.timeout()?)?;

        Ok(Self {
            config,
            sessions: HashMap::new(),
            session_secrets: HashMap::new(),
            sessionless,
            last_response: None,
            request_has_secrets: false,
        })
    }

    /// Library-wide defaults.
    #[must_use]
    pub const fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Creates a session, replacing any existing session with the same alias.
    ///
    /// Credentials, if any, are sent with Basic authentication.
    ///
    /// # Errors
    ///
    /// See [`Session::new`].
    pub fn create_session(
        &mut self,
        alias: impl Into<String>,
        url: impl Into<String>,
        options: SessionOptions,
    ) -> Result<&Session> {
        let session = Session::new(alias, url, options, &self.config)?;
        Ok(self.register(session))
    }

    /// Creates a session whose credentials are sent with Digest
    /// authentication.
    ///
    /// # Errors
    ///
    /// See [`Session::new`].
    pub fn create_digest_session(
        &mut self,
        alias: impl Into<String>,
        url: impl Into<String>,
        mut options: SessionOptions,
    ) -> Result<&Session> {
        options.auth = options.auth.map(|auth| auth.with_scheme(AuthScheme::Digest));
        self.create_session(alias, url, options)
    }

    /// Creates a session that presents a client certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate or key cannot be read or parsed.
    /// See also [`Session::new`].
    pub fn create_client_cert_session(
        &mut self,
        alias: impl Into<String>,
        url: impl Into<String>,
        client_cert: ClientCert,
        mut options: SessionOptions,
    ) -> Result<&Session> {
        options.client_cert = Some(client_cert);
        self.create_session(alias, url, options)
    }

    fn register(&mut self, session: Session) -> &Session {
        let has_secrets = session.auth().is_some_and(Auth::has_secrets);
        info!("Creating Session using : alias={}, url={}", session.alias(), session.url());

        self.session_secrets.insert(session.id(), has_secrets);

        match self.sessions.entry(session.alias().to_string()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(session);
                self.session_secrets.remove(&previous.id());
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    /// Whether a session is registered under `alias`.
    #[must_use]
    pub fn session_exists(&self, alias: &str) -> bool {
        self.sessions.contains_key(alias)
    }

    /// Looks up a session by alias.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError::SessionNotFound`] for an unknown alias.
    pub fn session(&self, alias: &str) -> Result<&Session> {
        self.sessions
            .get(alias)
            .ok_or_else(|| KeywordError::SessionNotFound(alias.to_string()))
    }

    /// Adds or replaces a session's default headers and adds cookies to its
    /// jar.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown alias or invalid headers.
    pub fn update_session(
        &mut self,
        alias: &str,
        headers: &[(String, String)],
        cookies: &[(String, String)],
    ) -> Result<()> {
        self.sessions
            .get_mut(alias)
            .ok_or_else(|| KeywordError::SessionNotFound(alias.to_string()))?
            .update(headers, cookies)
    }

    /// Removes every session and its secrets flag.
    pub fn delete_all_sessions(&mut self) {
        debug!("Deleting {} sessions", self.sessions.len());
        self.sessions.clear();
        self.session_secrets.clear();
    }

    /// Whether `session` was created with, or flagged as having, secret
    /// credentials.
    ///
    /// `None` and sessions this library does not know are reported as having
    /// no secrets.
    #[must_use]
    pub fn session_secrets_flag(&self, session: Option<&Session>) -> bool {
        session
            .and_then(|session| self.session_secrets.get(&session.id()))
            .copied()
            .unwrap_or(false)
    }

    /// Overwrites the secrets flag of `session`.
    ///
    /// Sessions that are not registered with this library are ignored.
    pub fn set_session_secrets_flag(&mut self, session: &Session, has_secrets: bool) {
        if !self.sessions.values().any(|known| known.id() == session.id()) {
            debug!("Ignoring secrets flag for unregistered session '{}'", session.alias());
            return;
        }
        self.session_secrets.insert(session.id(), has_secrets);
    }

    /// Whether the most recent request carried secret credentials.
    #[must_use]
    pub const fn request_has_secrets(&self) -> bool {
        self.request_has_secrets
    }

    /// The most recent response, including ones that failed a status check.
    #[must_use]
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Sends a request, through `session` if given.
    ///
    /// The URL is resolved with [`merge_url`]. The response is recorded as
    /// the last response before its status is checked against
    /// `options.expected_status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built or sent, or the status
    /// check fails.
    pub async fn request(
        &mut self,
        method: Method,
        session: Option<&Session>,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_has_secrets = self.session_secrets_flag(session) || options.has_secrets();
        let redact = self.request_has_secrets;
        let url = merge_url(session, url);

        let response = match session {
            Some(session) => session.send(method, &url, &options, redact).await?,
            None => {
                let outgoing = Outgoing {
                    method,
                    url: &url,
                    headers: &[],
                    auth: options.auth.as_ref(),
                    options: &options,
                    redact,
                };
                self.sessionless.send(&outgoing).await?
            }
        };

        self.last_response = Some(response.clone());
        check_status(
            options.expected_status.as_ref(),
            &response,
            options.msg.as_deref(),
        )?;

        Ok(response)
    }

    /// Sends a request through the session registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError::SessionNotFound`] for an unknown alias, and
    /// otherwise the errors of [`request`](Self::request).
    pub async fn request_on_session(
        &mut self,
        method: Method,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let session = self.session(alias)?.clone();
        self.request(method, Some(&session), url, options).await
    }

    /// Sends a GET request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn get_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::GET, alias, url, options)
            .await
    }

    /// Sends a POST request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn post_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::POST, alias, url, options)
            .await
    }

    /// Sends a PUT request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn put_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::PUT, alias, url, options)
            .await
    }

    /// Sends a PATCH request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn patch_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::PATCH, alias, url, options)
            .await
    }

    /// Sends a DELETE request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn delete_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::DELETE, alias, url, options)
            .await
    }

    /// Sends a HEAD request on a session. Redirects are not followed unless
    /// `allow_redirects` is set.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn head_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::HEAD, alias, url, options)
            .await
    }

    /// Sends an OPTIONS request on a session.
    ///
    /// # Errors
    ///
    /// See [`request_on_session`](Self::request_on_session).
    pub async fn options_on_session(
        &mut self,
        alias: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request_on_session(Method::OPTIONS, alias, url, options)
            .await
    }

    /// Sends a GET request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, None, url, options).await
    }

    /// Sends a POST request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, None, url, options).await
    }

    /// Sends a PUT request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, None, url, options).await
    }

    /// Sends a PATCH request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PATCH, None, url, options).await
    }

    /// Sends a DELETE request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, None, url, options).await
    }

    /// Sends a HEAD request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn head(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::HEAD, None, url, options).await
    }

    /// Sends an OPTIONS request without a session.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn options(&mut self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::OPTIONS, None, url, options).await
    }

    /// Fails unless the response status matches `expected`.
    ///
    /// Checks the last response when `response` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError::NoResponse`] when there is nothing to check,
    /// or [`KeywordError::StatusMismatch`].
    pub fn status_should_be(
        &self,
        expected: &ExpectedStatus,
        response: Option<&Response>,
        msg: Option<&str>,
    ) -> Result<()> {
        expected.check(self.response_or_last(response)?, msg)
    }

    /// Fails if the response status is 4xx or 5xx.
    ///
    /// Checks the last response when `response` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordError::NoResponse`] when there is nothing to check,
    /// or [`KeywordError::HttpError`].
    pub fn request_should_be_successful(&self, response: Option<&Response>) -> Result<()> {
        raise_for_status(self.response_or_last(response)?)
    }

    fn response_or_last<'a>(&'a self, response: Option<&'a Response>) -> Result<&'a Response> {
        response
            .or(self.last_response.as_ref())
            .ok_or(KeywordError::NoResponse)
    }
}
