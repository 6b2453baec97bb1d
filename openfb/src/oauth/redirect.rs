use super::signed_request::decode_signed_request;
use crate::query::{parse_query_string, query_value};
use crate::types::{AuthResponse, LoginOutcome};
use std::time::Duration;

const TOKEN_MARKER: &str = "access_token=";
const ERROR_MARKER: &str = "error=";

/// Provider error reported when the signed request cannot be accepted.
pub const INVALID_SIGNED_REQUEST: &str = "invalid_signed_request";

fn contains_marker(url: &str, marker: &str) -> bool {
    // A marker at position 0 is not a redirect, just a bare parameter string.
    matches!(url.find(marker), Some(pos) if pos > 0)
}

/// True if `url` ends the login flow (carries a token or an error).
pub fn is_terminal_redirect(url: &str) -> bool {
    contains_marker(url, TOKEN_MARKER) || contains_marker(url, ERROR_MARKER)
}

fn fragment(url: &str) -> &str {
    match url.split_once('#') {
        Some((_, frag)) => frag,
        None => url.split_once('?').map(|(_, q)| q).unwrap_or(url),
    }
}

fn query(url: &str) -> &str {
    let before_fragment = url.split_once('#').map(|(head, _)| head).unwrap_or(url);
    match before_fragment.split_once('?') {
        Some((_, q)) => q,
        None => fragment(url),
    }
}

/// Classify a redirect URL into a login outcome.
///
/// The token branch is checked first, so a URL carrying both markers is
/// treated as a success.
pub fn classify_redirect(url: &str) -> LoginOutcome {
    if contains_marker(url, TOKEN_MARKER) {
        return classify_token_fragment(fragment(url));
    }

    if contains_marker(url, ERROR_MARKER) {
        let mut pairs = parse_query_string(query(url));
        if query_value(&pairs, "error").is_none() {
            pairs = parse_query_string(fragment(url));
        }
        let provider_error = query_value(&pairs, "error")
            .filter(|e| !e.is_empty())
            .map(String::from);
        return LoginOutcome::NotAuthorized { provider_error };
    }

    LoginOutcome::NotAuthorized {
        provider_error: None,
    }
}

fn classify_token_fragment(fragment: &str) -> LoginOutcome {
    let pairs = parse_query_string(fragment);

    let access_token = match query_value(&pairs, "access_token") {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            return LoginOutcome::NotAuthorized {
                provider_error: None,
            };
        }
    };

    let expires_in = query_value(&pairs, "expires_in")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let user_id = match query_value(&pairs, "signed_request").filter(|s| !s.is_empty()) {
        Some(raw) => match decode_signed_request(raw) {
            Ok(signed) => signed.payload.user_id,
            Err(e) => {
                tracing::warn!("Rejecting redirect with bad signed request: {}", e);
                return LoginOutcome::not_authorized(INVALID_SIGNED_REQUEST);
            }
        },
        None => None,
    };

    LoginOutcome::Connected(AuthResponse {
        access_token,
        expires_in,
        user_id,
    })
}
