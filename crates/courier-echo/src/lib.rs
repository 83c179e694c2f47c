//! # courier-echo
//!
//! A small HTTP echo server used as a fixture for courier tests. It reflects
//! requests back as JSON, answers with canned status codes and guards a few
//! endpoints behind Basic and Digest authentication.
//!
//! ## Example
//!
//! ```no_run
//! use courier_echo::{EchoConfig, bind, serve};
//!
//! # async fn run() -> courier_echo::Result<()> {
//! let config = EchoConfig::default();
//! let listener = bind(&config).await?;
//! serve(listener, config, std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get};
use tokio::net::TcpListener;
use tracing::info;

pub mod config;
pub mod error;
pub mod handlers;
pub mod request_info;
pub mod response;

pub use config::EchoConfig;
pub use error::{EchoError, Result};

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Key that signs Digest nonces.
    pub digest_secret_key: Arc<str>,
}

impl From<&EchoConfig> for AppState {
    fn from(config: &EchoConfig) -> Self {
        Self {
            digest_secret_key: Arc::from(config.digest_secret_key.as_str()),
        }
    }
}

/// Builds the application router.
pub fn router(config: &EchoConfig) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/headers", get(handlers::headers))
        .route("/anything", any(handlers::anything))
        .route("/anything/*path", any(handlers::anything))
        .route("/status/:codes", any(handlers::status::status))
        .route("/redirect-to", any(handlers::redirect::redirect_to))
        .route("/basic-auth/:user/:passwd", get(handlers::auth::basic_auth))
        .route(
            "/digest-auth/:qop/:user/:passwd",
            get(handlers::auth::digest_auth),
        )
        .route(
            "/digest-auth/:qop/:user/:passwd/:algorithm",
            get(handlers::auth::digest_auth),
        )
        .layer(DefaultBodyLimit::max(request_info::MAX_BODY_BYTES))
        .layer(middleware::from_fn(log_request))
        .with_state(AppState::from(config))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Handled request"
    );
    response
}

/// Binds the address named in `config`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn bind(config: &EchoConfig) -> Result<TcpListener> {
    Ok(TcpListener::bind(config.address()).await?)
}

/// Serves requests on `listener` until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, config: EchoConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Echo server listening");

    axum::serve(
        listener,
        router(&config).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Echo server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use axum::body::{Body, to_bytes};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
    use axum::http::{Method, StatusCode};
    use courier_common::digest::{DigestChallenge, DigestRequest};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn call(request: axum::http::Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = router(&EchoConfig::default()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get(uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        call(axum::http::Request::get(uri).body(Body::empty()).unwrap()).await
    }

    fn json_body(body: &[u8]) -> Value {
        assert_eq!(body.last(), Some(&b'\n'));
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let (status, _, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().starts_with("Courier Echo Server"));
    }

    #[tokio::test]
    async fn test_status_single_code() {
        let (status, _, body) = get("/status/200").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let request = axum::http::Request::post("/status/201")
            .body(Body::from("ignored"))
            .unwrap();
        let (status, _, _) = call(request).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_status_zero_weight_never_wins() {
        for _ in 0..50 {
            let (status, _, _) = get("/status/404:1,500:0").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_status_rejects_garbage() {
        let (status, _, body) = get("/status/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Invalid status code");

        let (status, _, _) = get("/status/200:0,404:0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_redirect_to() {
        let (status, headers, _) = get("/redirect-to?url=http%3A%2F%2Fexample.com%2F&status_code=307").await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(headers[LOCATION], "http://example.com/");

        let (status, headers, _) = get("/redirect-to?URL=/anything").await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers[LOCATION], "/anything");

        let (status, _, _) = get("/redirect-to").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_headers_endpoint() {
        let request = axum::http::Request::get("/headers")
            .header("x-custom", "value")
            .header("x-forwarded-for", "10.1.1.1")
            .body(Body::empty())
            .unwrap();
        let (_, headers, body) = call(request).await;
        assert_eq!(headers[CONTENT_TYPE], "application/json");

        let body = json_body(&body);
        assert_eq!(body["headers"]["X-Custom"], "value");
        assert!(body["headers"].get("X-Forwarded-For").is_none());

        let request = axum::http::Request::get("/headers?show_env=1")
            .header("x-forwarded-for", "10.1.1.1")
            .body(Body::empty())
            .unwrap();
        let (_, _, body) = call(request).await;
        assert_eq!(json_body(&body)["headers"]["X-Forwarded-For"], "10.1.1.1");
    }

    #[tokio::test]
    async fn test_anything_json() {
        let request = axum::http::Request::builder()
            .method(Method::PUT)
            .uri("/anything?a=1&a=2&b=3")
            .header("host", "localhost:5000")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"key":"value"}"#))
            .unwrap();
        let (status, _, body) = call(request).await;
        assert_eq!(status, StatusCode::OK);

        let body = json_body(&body);
        assert_eq!(body["method"], "PUT");
        assert_eq!(body["args"], json!({"a": ["1", "2"], "b": "3"}));
        assert_eq!(body["json"], json!({"key": "value"}));
        assert_eq!(body["data"], r#"{"key":"value"}"#);
        assert_eq!(body["url"], "http://localhost:5000/anything?a=1&a=2&b=3");
    }

    #[tokio::test]
    async fn test_anything_form() {
        let request = axum::http::Request::post("/anything")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=alice&tag=a&tag=b"))
            .unwrap();
        let (_, _, body) = call(request).await;

        let body = json_body(&body);
        assert_eq!(body["form"], json!({"name": "alice", "tag": ["a", "b"]}));
        assert_eq!(body["data"], "");
        assert_eq!(body["json"], Value::Null);
    }

    #[tokio::test]
    async fn test_anything_multipart() {
        let boundary = "XBOUNDARYX";
        let payload = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"field\"\r\n\r\n\
             plain\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             file contents\r\n\
             --{boundary}--\r\n"
        );
        let request = axum::http::Request::post("/anything")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .unwrap();
        let (status, _, body) = call(request).await;
        assert_eq!(status, StatusCode::OK);

        let body = json_body(&body);
        assert_eq!(body["form"], json!({"field": "plain"}));
        assert_eq!(body["files"], json!({"upload": "file contents"}));
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let request = axum::http::Request::get("/basic-auth/user/passwd")
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNzd2Q=")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({"authenticated": true, "user": "user"}));

        let (status, headers, body) = get("/basic-auth/user/passwd").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            headers[WWW_AUTHENTICATE],
            r#"Basic realm="Authentication Required""#
        );
        assert_eq!(body, b"Unauthorized Access");
    }

    async fn digest_roundtrip(uri: &str, password: &str) -> StatusCode {
        let (status, headers, _) = get(uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let challenge =
            DigestChallenge::parse(headers[WWW_AUTHENTICATE].to_str().unwrap()).unwrap();
        let request = DigestRequest {
            method: "GET",
            uri,
            body: b"",
        };
        let credentials = challenge.respond(&request, "user", password);

        let request = axum::http::Request::get(uri)
            .header(AUTHORIZATION, credentials.to_header_value())
            .body(Body::empty())
            .unwrap();
        call(request).await.0
    }

    #[tokio::test]
    async fn test_digest_auth_flows() {
        assert_eq!(
            digest_roundtrip("/digest-auth/auth/user/passwd", "passwd").await,
            StatusCode::OK
        );
        assert_eq!(
            digest_roundtrip("/digest-auth/auth-int/user/passwd/SHA-256", "passwd").await,
            StatusCode::OK
        );
        assert_eq!(
            digest_roundtrip("/digest-auth/legacy/user/passwd/SHA-512", "passwd").await,
            StatusCode::OK
        );
        assert_eq!(
            digest_roundtrip("/digest-auth/auth/user/passwd", "wrong").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_digest_challenge_shape() {
        let (_, headers, _) = get("/digest-auth/auth/user/passwd/SHA-256").await;
        let challenge =
            DigestChallenge::parse(headers[WWW_AUTHENTICATE].to_str().unwrap()).unwrap();

        assert_eq!(challenge.realm, "Authentication Required");
        assert_eq!(challenge.algorithm.as_str(), "SHA-256");
        assert!(challenge.opaque.is_some());
        assert!(handlers::auth::verify_nonce(
            &EchoConfig::default().digest_secret_key,
            &challenge.nonce
        ));

        let (status, _, _) = get("/digest-auth/auth/user/passwd/SHA-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, EchoConfig::default(), async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
