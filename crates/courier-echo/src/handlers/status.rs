//! `/status/:codes`: canned responses for a fixed or randomly picked status.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::http::header::{LOCATION, PROXY_AUTHENTICATE, WWW_AUTHENTICATE};
use axum::response::{IntoResponse, Response};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde_json::json;

use crate::error::{EchoError, Result};
use crate::response::JsonLine;

const REDIRECT_LOCATION: &str = "/redirect/1";

const ACCEPTED_MEDIA_TYPES: [&str; 5] = [
    "image/webp",
    "image/svg+xml",
    "image/jpeg",
    "image/png",
    "image/*",
];

const TEAPOT: &str = r#"
    -=[ teapot ]=-

       _...._
     .'  _ _ `.
    | ."` ^ `". _,
    \_;`"---"`|//
      |       ;/
      \_     _/
        `"""`
"#;

pub async fn status(Path(codes): Path<String>) -> Result<Response> {
    let choices = parse_codes(&codes)?;
    let code = if let [(code, _)] = choices.as_slice() {
        *code
    } else {
        weighted_choice(&choices, &mut rand::rng())?
    };

    canned_response(code)
}

/// Parses `code` or `code[:weight],...`; weights default to 1.
pub fn parse_codes(codes: &str) -> Result<Vec<(u16, f64)>> {
    if !codes.contains(',') {
        return Ok(vec![(parse_code(codes)?, 1.0)]);
    }

    codes.split(',')
        .map(|choice| {
            let (code, weight) = match choice.split_once(':') {
                Some((code, weight)) => (code, weight.trim().parse::<f64>().ok()),
                None => (choice, Some(1.0)),
            };
            let weight = weight
                .filter(|w| w.is_finite() && *w >= 0.0)
                .ok_or(EchoError::InvalidStatusCode)?;
            Ok((parse_code(code)?, weight))
        })
        .collect()
}

fn parse_code(code: &str) -> Result<u16> {
    code.trim()
        .parse::<u16>()
        .ok()
        .filter(|code| (100..=999).contains(code))
        .ok_or(EchoError::InvalidStatusCode)
}

/// Picks a code with probability proportional to its weight.
///
/// # Errors
///
/// Returns [`EchoError::InvalidStatusCode`] if there are no choices or the
/// weights sum to zero.
pub fn weighted_choice<R: Rng + ?Sized>(choices: &[(u16, f64)], rng: &mut R) -> Result<u16> {
    let index = WeightedIndex::new(choices.iter().map(|(_, weight)| *weight))
        .map_err(|_| EchoError::InvalidStatusCode)?;

    choices
        .get(index.sample(rng))
        .map(|(code, _)| *code)
        .ok_or(EchoError::InvalidStatusCode)
}

/// Builds the canned response for `code`.
///
/// # Errors
///
/// Returns [`EchoError::InvalidStatusCode`] if `code` is outside 100..=999.
pub fn canned_response(code: u16) -> Result<Response> {
    let status = StatusCode::from_u16(code).map_err(|_| EchoError::InvalidStatusCode)?;

    let response = match code {
        301 | 302 | 303 | 305 | 307 => (status, [(LOCATION, REDIRECT_LOCATION)]).into_response(),
        401 => (status, [(WWW_AUTHENTICATE, r#"Basic realm="Fake Realm""#)]).into_response(),
        402 => (
            status,
            [("x-more-info", "http://vimeo.com/22053820")],
            "Payment Required: pay me!",
        )
            .into_response(),
        406 => (
            status,
            JsonLine(json!({
                "message": "Client did not request a supported media type.",
                "accept": ACCEPTED_MEDIA_TYPES,
            })),
        )
            .into_response(),
        407 => (status, [(PROXY_AUTHENTICATE, r#"Basic realm="Fake Realm""#)]).into_response(),
        418 => (
            status,
            [("x-more-info", "http://tools.ietf.org/html/rfc2324")],
            TEAPOT,
        )
            .into_response(),
        _ => status.into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_parse_single_code() {
        assert_eq!(parse_codes("200").unwrap(), vec![(200, 1.0)]);
        assert!(matches!(parse_codes("abc"), Err(EchoError::InvalidStatusCode)));
        assert!(matches!(parse_codes("42"), Err(EchoError::InvalidStatusCode)));
        assert!(matches!(parse_codes("1000"), Err(EchoError::InvalidStatusCode)));
    }

    #[test]
    fn test_parse_weighted_codes() {
        assert_eq!(
            parse_codes("200:0.5,404,500:2").unwrap(),
            vec![(200, 0.5), (404, 1.0), (500, 2.0)]
        );
        assert!(parse_codes("200,abc").is_err());
        assert!(parse_codes("200:x,404").is_err());
        assert!(parse_codes("200:1:2,404").is_err());
        assert!(parse_codes("200:-1,404").is_err());
        assert!(parse_codes("200:inf,404").is_err());
        assert!(parse_codes("200,").is_err());
    }

    #[test]
    fn test_zero_weight_is_never_picked() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert_eq!(weighted_choice(&[(404, 1.0), (500, 0.0)], &mut rng).unwrap(), 404);
            assert_eq!(weighted_choice(&[(500, 0.0), (404, 1.0)], &mut rng).unwrap(), 404);
        }
    }

    #[test]
    fn test_weights_bias_choice() {
        let mut rng = StdRng::seed_from_u64(42);
        let picks: Vec<u16> = (0..2000)
            .map(|_| weighted_choice(&[(200, 1.0), (500, 9.0)], &mut rng).unwrap())
            .collect();
        let errors = picks.iter().filter(|code| **code == 500).count();

        assert!(picks.contains(&200));
        assert!(errors > 1600, "{errors}");
    }

    #[test]
    fn test_tiny_weights_still_sample() {
        let mut rng = StdRng::seed_from_u64(3);
        let choices = [(200, 0.1), (201, 0.2), (202, 0.0), (203, f64::MIN_POSITIVE)];
        for _ in 0..1000 {
            let code = weighted_choice(&choices, &mut rng).unwrap();
            assert_ne!(code, 202);
        }
    }

    #[test]
    fn test_zero_total_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(weighted_choice(&[(200, 0.0), (404, 0.0)], &mut rng).is_err());
        assert!(weighted_choice(&[], &mut rng).is_err());
    }

    #[test]
    fn test_canned_responses() {
        let response = canned_response(302).unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], REDIRECT_LOCATION);

        let response = canned_response(401).unwrap();
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            r#"Basic realm="Fake Realm""#
        );

        let response = canned_response(418).unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            response.headers()["x-more-info"],
            "http://tools.ietf.org/html/rfc2324"
        );

        let response = canned_response(406).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()["content-type"], "application/json");

        assert_eq!(canned_response(599).unwrap().status().as_u16(), 599);
    }
}

#[cfg(test)]
mod fuzz_tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn parse_codes_never_panics(codes in "[0-9a-z:,.\\-]{0,24}") {
            let _ = parse_codes(&codes);
        }

        #[test]
        fn parsed_codes_are_representable(codes in "[0-9]{1,4}(:[0-9]{1,2})?(,[0-9]{1,4}(:[0-9]{1,2})?){0,3}") {
            if let Ok(choices) = parse_codes(&codes) {
                for (code, weight) in choices {
                    prop_assert!(StatusCode::from_u16(code).is_ok());
                    prop_assert!(weight >= 0.0);
                }
            }
        }
    }
}
