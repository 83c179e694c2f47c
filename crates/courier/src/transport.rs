//! Request building and dispatch.
//!
//! A [`Transport`] owns two reqwest clients that share TLS, proxy and cookie
//! settings: one follows redirects and one does not. Each is wrapped in the
//! retry middleware stack for methods the [`RetryConfig`] allows.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use courier_common::digest::DigestRequest;
use courier_common::{Auth, AuthScheme, DigestChallenge};
use log::debug;
use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity, Method, Proxy, StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{
    RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
};
use reqwest_retry_after::RetryAfterMiddleware;

use crate::config::{MAX_BACKOFF, RetryConfig, timeout_duration};
use crate::error::{KeywordError, Result};
use crate::logging::{log_request, log_response};
use crate::request::{FilePart, RequestBody, RequestOptions};
use crate::response::Response;
use crate::url::request_target;

/// Settings applied to every client a transport builds.
#[derive(Default)]
pub(crate) struct ClientSettings {
    pub proxies: Vec<Proxy>,
    pub identity: Option<Identity>,
    pub root_certificate: Option<Certificate>,
    pub accept_invalid_certs: bool,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl ClientSettings {
    fn build(&self, policy: Policy) -> Result<Client> {
        let mut builder = Client::builder()
            .redirect(policy)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        for proxy in &self.proxies {
            builder = builder.proxy(proxy.clone());
        }
        if let Some(identity) = &self.identity {
            builder = builder.identity(identity.clone());
        }
        if let Some(certificate) = &self.root_certificate {
            builder = builder.add_root_certificate(certificate.clone());
        }
        if let Some(jar) = &self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        Ok(builder.build()?)
    }
}

/// Retries responses whose status is in the configured list, and transient
/// connection errors.
struct StatusListStrategy {
    statuses: Vec<u16>,
}

impl RetryableStrategy for StatusListStrategy {
    fn handle(
        &self,
        res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if self.statuses.contains(&response.status().as_u16()) => {
                debug!("Retrying on status {}", response.status());
                Some(Retryable::Transient)
            }
            Ok(_) => None,
            Err(error) => default_on_request_failure(error),
        }
    }
}

#[derive(Clone)]
struct Channel {
    client: Client,
    retrying: ClientWithMiddleware,
}

impl Channel {
    fn new(client: Client, retry: &RetryConfig) -> Self {
        let initial = retry.initial_backoff();
        let policy = ExponentialBackoff::builder()
            .retry_bounds(initial, MAX_BACKOFF.max(initial))
            .build_with_max_retries(retry.max_retries);

        let strategy = StatusListStrategy {
            statuses: retry.status_list.clone(),
        };

        // Retry-After must see the response before the backoff policy does
        let retrying = reqwest_middleware::ClientBuilder::new(client.clone())
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                policy, strategy,
            ))
            .build();

        Self { client, retrying }
    }

    async fn execute(
        &self,
        request: reqwest::Request,
        retrying: bool,
        redact: bool,
    ) -> Result<reqwest::Response> {
        log_request(&request, redact);

        if retrying {
            Ok(self.retrying.execute(request).await?)
        } else {
            Ok(self.client.execute(request).await?)
        }
    }
}

/// A request ready to be built against a transport.
pub(crate) struct Outgoing<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub auth: Option<&'a Auth>,
    pub options: &'a RequestOptions,
    pub redact: bool,
}

/// A pair of clients (following and not following redirects) plus the
/// policy used to drive them.
#[derive(Clone)]
pub(crate) struct Transport {
    follow: Channel,
    no_follow: Channel,
    retry: RetryConfig,
    timeout: Option<Duration>,
}

impl Transport {
    pub(crate) fn new(
        settings: &ClientSettings,
        retry: RetryConfig,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        retry.validate()?;

        Ok(Self {
            follow: Channel::new(settings.build(Policy::default())?, &retry),
            no_follow: Channel::new(settings.build(Policy::none())?, &retry),
            retry,
            timeout,
        })
    }

    /// Sends a request and buffers the response.
    ///
    /// Digest credentials are sent only in answer to a challenge, so a Digest
    /// request that draws a 401 is rebuilt with an `Authorization` header and
    /// sent once more.
    pub(crate) async fn send(&self, outgoing: &Outgoing<'_>) -> Result<Response> {
        let allow_redirects = outgoing
            .options
            .allow_redirects
            .unwrap_or(outgoing.method != Method::HEAD);
        let channel = if allow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };
        // multipart bodies are streamed and cannot be replayed
        let retrying = self.retry.applies_to(&outgoing.method) && outgoing.options.files.is_empty();

        let request = self.build_request(&channel.client, outgoing, None)?;
        let body = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .map(Bytes::copy_from_slice)
            .unwrap_or_default();

        let mut response = channel.execute(request, retrying, outgoing.redact).await?;

        if let Some(auth) = outgoing.auth.filter(|auth| auth.scheme == AuthScheme::Digest)
            && response.status() == StatusCode::UNAUTHORIZED
            && let Some(challenge) = digest_challenge(response.headers())?
        {
            debug!("Answering Digest challenge for realm '{}'", challenge.realm);

            // the challenge may come from a redirect target
            let url = response.url().clone();
            let target = request_target(&url);
            let (username, password) = auth.reveal();
            let digest_request = DigestRequest {
                method: outgoing.method.as_str(),
                uri: &target,
                body: &body,
            };
            let credentials = challenge.respond(&digest_request, username, password);

            let answer = DigestAnswer {
                url,
                authorization: credentials.to_header_value(),
            };
            let request = self.build_request(&channel.client, outgoing, Some(&answer))?;
            response = channel.execute(request, retrying, outgoing.redact).await?;
        }

        let response = Response::from_reqwest(outgoing.method.clone(), response).await?;
        log_response(&response, outgoing.redact);

        Ok(response)
    }

    fn build_request(
        &self,
        client: &Client,
        outgoing: &Outgoing<'_>,
        answer: Option<&DigestAnswer>,
    ) -> Result<reqwest::Request> {
        let options = outgoing.options;
        let mut builder = match answer {
            // the answered URL already carries the query string
            Some(answer) => client.request(outgoing.method.clone(), answer.url.clone()),
            None => {
                let url = Url::parse(outgoing.url).map_err(|e| KeywordError::InvalidUrl {
                    url: outgoing.url.to_string(),
                    reason: e.to_string(),
                })?;
                let builder = client.request(outgoing.method.clone(), url);
                if options.params.is_empty() {
                    builder
                } else {
                    builder.query(&options.params)
                }
            }
        }
        .headers(merge_headers(outgoing.headers, &options.headers)?);

        if !options.cookies.is_empty() {
            builder = builder.header(COOKIE, cookie_header(&options.cookies));
        }

        let timeout = options.timeout.map(timeout_duration).transpose()?;
        if let Some(timeout) = timeout.or(self.timeout) {
            builder = builder.timeout(timeout);
        }

        match (answer, outgoing.auth) {
            (Some(answer), _) => {
                builder = builder.header(AUTHORIZATION, answer.authorization.as_str());
            }
            (None, Some(auth)) if auth.scheme == AuthScheme::Basic => {
                let (username, password) = auth.reveal();
                builder = builder.basic_auth(username, Some(password));
            }
            _ => {}
        }

        builder = match (&options.body, options.files.is_empty()) {
            (None, true) => builder,
            (Some(RequestBody::Form(fields)), true) => builder.form(fields),
            (Some(RequestBody::Text(text)), true) => builder.body(text.clone()),
            (Some(RequestBody::Bytes(bytes)), true) => builder.body(bytes.clone()),
            (Some(RequestBody::Json(value)), true) => builder.json(value),
            (None, false) => builder.multipart(multipart_form(&[], &options.files)?),
            (Some(RequestBody::Form(fields)), false) => {
                builder.multipart(multipart_form(fields, &options.files)?)
            }
            (Some(_), false) => {
                return Err(KeywordError::InvalidRequest(
                    "files can only be combined with form data".to_string(),
                ));
            }
        };

        Ok(builder.build()?)
    }
}

/// A Digest `Authorization` value and the URL it was computed for.
struct DigestAnswer {
    url: Url,
    authorization: String,
}

/// Finds the first Digest challenge among the `WWW-Authenticate` headers.
fn digest_challenge(headers: &HeaderMap) -> Result<Option<DigestChallenge>> {
    let Some(header) = headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
    else {
        return Ok(None);
    };

    Ok(Some(DigestChallenge::parse(header)?))
}

/// Merges default headers with call headers; call headers win.
pub(crate) fn merge_headers(
    defaults: &[(String, String)],
    overrides: &[(String, String)],
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in defaults.iter().chain(overrides) {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| KeywordError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| KeywordError::InvalidRequest(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn multipart_form(fields: &[(String, String)], files: &[FilePart]) -> Result<Form> {
    let mut form = Form::new();

    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }

    for file in files {
        let mut part = Part::bytes(file.content.to_vec());
        if let Some(file_name) = &file.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        form = form.part(file.field.clone(), part);
    }

    Ok(form)
}
