//! `/basic-auth` and `/digest-auth`: endpoints that only answer to the
//! credentials named in their path.

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use courier_common::digest::{DigestAlgorithm, DigestChallenge, DigestCredentials, DigestQop};
use courier_common::parse_basic_header;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::AppState;
use crate::error::{EchoError, Result};
use crate::response::JsonLine;

const REALM: &str = "Authentication Required";

pub async fn basic_auth(
    Path((user, passwd)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_header);

    match presented {
        Some((username, password)) if username == user && password == passwd => {
            authenticated(&username)
        }
        _ => unauthorized(format!("Basic realm=\"{REALM}\"")),
    }
}

/// Path parameters of both digest routes.
#[derive(Debug, Deserialize)]
pub struct DigestRoute {
    qop: String,
    user: String,
    passwd: String,
    algorithm: Option<String>,
}

pub async fn digest_auth(
    State(state): State<AppState>,
    Path(route): Path<DigestRoute>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let algorithm = route
        .algorithm
        .as_deref()
        .map_or(Ok(DigestAlgorithm::Md5), str::parse::<DigestAlgorithm>)
        .map_err(|e| EchoError::BadRequest(e.to_string()))?;

    let verifier = DigestVerifier {
        secret: &state.digest_secret_key,
        user: &route.user,
        passwd: &route.passwd,
        algorithm,
        qop: offered_qop(&route.qop),
    };

    let credentials = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(DigestCredentials::parse);

    match credentials {
        Some(Ok(credentials)) => {
            let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
            if verifier.accepts(&credentials, method.as_str(), target, &body) {
                return Ok(authenticated(&credentials.username));
            }
        }
        Some(Err(e)) => debug!("Rejected digest credentials: {e}"),
        None => {}
    }

    Ok(unauthorized(verifier.challenge().to_header_value()))
}

/// Qop values offered for the `:qop` path segment; anything other than
/// `auth` or `auth-int` selects the legacy scheme without qop.
fn offered_qop(segment: &str) -> Vec<DigestQop> {
    segment.parse::<DigestQop>().map(|qop| vec![qop]).unwrap_or_default()
}

struct DigestVerifier<'a> {
    secret: &'a str,
    user: &'a str,
    passwd: &'a str,
    algorithm: DigestAlgorithm,
    qop: Vec<DigestQop>,
}

impl DigestVerifier<'_> {
    fn challenge(&self) -> DigestChallenge {
        DigestChallenge {
            realm: REALM.to_string(),
            nonce: sign_nonce(self.secret, chrono::Utc::now().timestamp_millis()),
            opaque: Some(opaque(self.secret)),
            algorithm: self.algorithm,
            qop: self.qop.clone(),
            stale: false,
        }
    }

    fn accepts(&self, credentials: &DigestCredentials, method: &str, uri: &str, body: &[u8]) -> bool {
        let qop_matches = match credentials.qop {
            Some(qop) => self.qop.contains(&qop),
            None => self.qop.is_empty(),
        };

        let checks = [
            ("username", credentials.username == self.user),
            ("realm", credentials.realm == REALM),
            ("algorithm", credentials.algorithm == self.algorithm),
            ("qop", qop_matches),
            ("uri", credentials.uri == uri),
            ("nonce", verify_nonce(self.secret, &credentials.nonce)),
            (
                "opaque",
                credentials.opaque.as_deref() == Some(opaque(self.secret).as_str()),
            ),
        ];

        if let Some((name, _)) = checks.iter().find(|(_, ok)| !ok) {
            debug!("Digest credentials rejected: {name} mismatch");
            return false;
        }

        credentials.verify(self.passwd, method, body)
    }
}

/// Builds a nonce that carries its own timestamp and signature.
pub fn sign_nonce(secret: &str, timestamp: i64) -> String {
    let signature = DigestAlgorithm::Sha256.hash(format!("{timestamp}:{secret}").as_bytes());
    STANDARD.encode(format!("{timestamp} {signature}"))
}

/// Whether `nonce` was produced by [`sign_nonce`] with `secret`.
pub fn verify_nonce(secret: &str, nonce: &str) -> bool {
    let Some(timestamp) = STANDARD
        .decode(nonce)
        .ok()
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|decoded| decoded.split_once(' ')?.0.parse::<i64>().ok())
    else {
        return false;
    };

    sign_nonce(secret, timestamp) == nonce
}

fn opaque(secret: &str) -> String {
    DigestAlgorithm::Sha256.hash(format!("opaque:{secret}").as_bytes())
}

fn authenticated(user: &str) -> Response {
    JsonLine(json!({"authenticated": true, "user": user})).into_response()
}

fn unauthorized(challenge: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, challenge)],
        "Unauthorized Access",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_roundtrip() {
        let nonce = sign_nonce("secret", 1_700_000_000_000);
        assert!(verify_nonce("secret", &nonce));
        assert!(!verify_nonce("other", &nonce));
        assert!(!verify_nonce("secret", "bm90IGEgbm9uY2U="));
        assert!(!verify_nonce("secret", "***"));
    }

    #[test]
    fn test_offered_qop() {
        assert_eq!(offered_qop("auth"), vec![DigestQop::Auth]);
        assert_eq!(offered_qop("auth-int"), vec![DigestQop::AuthInt]);
        assert!(offered_qop("legacy").is_empty());
    }

    #[test]
    fn test_verifier_accepts_valid_answer() {
        let verifier = DigestVerifier {
            secret: "secret",
            user: "user",
            passwd: "passwd",
            algorithm: DigestAlgorithm::Sha256,
            qop: vec![DigestQop::Auth],
        };
        let challenge = verifier.challenge();
        let request = courier_common::digest::DigestRequest {
            method: "GET",
            uri: "/digest-auth/auth/user/passwd/SHA-256",
            body: b"",
        };

        let credentials = challenge.respond(&request, "user", "passwd");
        assert!(verifier.accepts(&credentials, "GET", request.uri, b""));
        assert!(!verifier.accepts(&credentials, "GET", "/elsewhere", b""));

        let wrong = challenge.respond(&request, "user", "wrong");
        assert!(!verifier.accepts(&wrong, "GET", request.uri, b""));

        let mut forged = credentials;
        forged.nonce = sign_nonce("other-secret", 1);
        assert!(!verifier.accepts(&forged, "GET", request.uri, b""));
    }
}
