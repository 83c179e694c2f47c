//! Route handlers.

pub mod auth;
pub mod redirect;
pub mod status;

use axum::extract::Request;
use axum::http::{HeaderMap, Uri};
use serde_json::{Value, json};

use crate::error::Result;
use crate::request_info::{RequestInfo, headers_json, wants_env};
use crate::response::JsonLine;

const BANNER: &str = "Courier Echo Server\n";

pub async fn index() -> &'static str {
    BANNER
}

pub async fn headers(uri: Uri, headers: HeaderMap) -> JsonLine<Value> {
    JsonLine(json!({"headers": headers_json(&headers, wants_env(uri.query()))}))
}

/// Reflects the whole request back.
pub async fn anything(request: Request) -> Result<JsonLine<RequestInfo>> {
    RequestInfo::from_request(request).await.map(JsonLine)
}
