//! # courier-common
//!
//! Credential and authentication primitives shared by the courier keyword
//! library and the courier echo server.
//!
//! - [`Secret`] and [`Credential`]: values that must never be printed
//! - [`Auth`]: username/password pairs presented with Basic or Digest
//! - [`digest`]: both sides of the HTTP Digest exchange
//!
//! ## Example
//!
//! ```
//! use courier_common::{Auth, Secret};
//! use courier_common::digest::{DigestChallenge, DigestRequest};
//!
//! let auth = Auth::digest("user", Secret::new("passwd"));
//! assert_eq!(format!("{:?}", auth.password), "Secret(Secret(<secret>))");
//!
//! let challenge = DigestChallenge::parse(
//!     r#"Digest realm="Authentication Required", nonce="abc", qop="auth""#,
//! )?;
//! let (username, password) = auth.reveal();
//! let request = DigestRequest { method: "GET", uri: "/digest-auth/auth/user/passwd", body: b"" };
//! let credentials = challenge.respond(&request, username, password);
//! assert!(credentials.verify("passwd", "GET", b""));
//! # Ok::<(), courier_common::digest::DigestError>(())
//! ```

pub mod auth;
pub mod digest;
/// Secret values and credentials.
pub mod secret;

pub use auth::{Auth, AuthScheme, parse_basic_header};
pub use digest::{DigestAlgorithm, DigestChallenge, DigestCredentials, DigestError, DigestQop};
pub use secret::{Credential, Secret, contains_secrets};
