//! # courier
//!
//! HTTP keywords for test automation.
//!
//! [`KeywordLibrary`] wraps reqwest into calls a test host can expose one to
//! one as keywords:
//! - alias-keyed sessions with base URLs, default headers, cookies and
//!   credentials
//! - Basic, Digest and client-certificate authentication
//! - retries with exponential backoff that honour `Retry-After`
//! - status assertions on the last response
//!
//! Credentials wrapped in [`Secret`](courier_common::Secret) are tracked per
//! session and per call, and `Authorization` headers are masked in the
//! request log while a secret is in play.
//!
//! ## Example
//!
//! ```no_run
//! use courier::{ExpectedStatus, KeywordLibrary, RequestOptions, SessionOptions};
//! use courier_common::{Auth, Secret};
//!
//! # async fn example() -> courier::Result<()> {
//! let mut library = KeywordLibrary::new()?;
//!
//! library.create_digest_session(
//!     "httpbin",
//!     "http://localhost:5000",
//!     SessionOptions::builder()
//!         .auth(Auth::digest("user", Secret::new("passwd")))
//!         .build(),
//! )?;
//!
//! let response = library
//!     .get_on_session(
//!         "httpbin",
//!         "/digest-auth/auth/user/passwd",
//!         RequestOptions::builder()
//!             .expected_status(ExpectedStatus::Any)
//!             .build(),
//!     )
//!     .await?;
//! println!("{}", response.text());
//!
//! library.request_should_be_successful(None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod keywords;
mod logging;
pub mod request;
pub mod response;
pub mod session;
pub mod status;
mod transport;
pub mod url;

pub use config::{LibraryConfig, RetryConfig};
pub use error::{KeywordError, Result};
pub use keywords::KeywordLibrary;
pub use logging::REDACTED;
pub use request::{FilePart, RequestBody, RequestOptions, pairs};
pub use response::Response;
pub use session::{ClientCert, Session, SessionOptions, Verify};
pub use status::ExpectedStatus;
