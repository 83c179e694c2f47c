//! `/redirect-to`: a 3xx response pointing at a caller-supplied URL.

use axum::extract::Query;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{EchoError, Result};

pub async fn redirect_to(Query(params): Query<Vec<(String, String)>>) -> Result<Response> {
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    let location = param("url")
        .ok_or_else(|| EchoError::BadRequest("Missing 'url' query parameter".to_string()))?;
    let location = HeaderValue::from_str(location)
        .map_err(|_| EchoError::BadRequest("Invalid 'url' query parameter".to_string()))?;

    Ok((redirect_status(param("status_code")), [(LOCATION, location)]).into_response())
}

/// Uses the requested status only when it is a 3xx code.
fn redirect_status(requested: Option<&str>) -> StatusCode {
    requested
        .and_then(|code| code.trim().parse::<u16>().ok())
        .filter(|code| (300..400).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_status() {
        assert_eq!(redirect_status(None), StatusCode::FOUND);
        assert_eq!(redirect_status(Some("307")), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(redirect_status(Some("399")).as_u16(), 399);
        assert_eq!(redirect_status(Some("200")), StatusCode::FOUND);
        assert_eq!(redirect_status(Some("400")), StatusCode::FOUND);
        assert_eq!(redirect_status(Some("abc")), StatusCode::FOUND);
    }
}
