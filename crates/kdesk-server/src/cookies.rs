//! Credential cookies.
//!
//! Values are percent-encoded on the way out and percent-decoded on the way
//! in. A `+` is always literal, so raw values written by other clients read
//! back unchanged.

use axum::http::{HeaderMap, HeaderValue, header};
use url::form_urlencoded;

use kdesk_config::{
    API_KEY_COOKIE, BASE_URL_COOKIE, MODEL_COOKIE, ServerConfig, SessionCredentials,
};

use crate::error::{Result, ServerError};

/// Look up one cookie in the request's `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, raw)| decode(raw.trim_matches('"')))
}

fn decode(raw: &str) -> String {
    let escaped = raw
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    form_urlencoded::parse(escaped.as_bytes())
        .map(|(value, _)| value.into_owned())
        .collect()
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Credentials carried by the request's cookies.
pub fn credentials(headers: &HeaderMap) -> Result<SessionCredentials> {
    let base_url = cookie(headers, BASE_URL_COOKIE);
    let api_key = cookie(headers, API_KEY_COOKIE);
    let model = cookie(headers, MODEL_COOKIE);
    Ok(SessionCredentials::from_parts(
        base_url.as_deref(),
        api_key.as_deref(),
        model.as_deref(),
    )?)
}

/// `Set-Cookie` values storing `credentials`.
pub fn set_credential_cookies(
    credentials: &SessionCredentials,
    config: &ServerConfig,
) -> Result<Vec<HeaderValue>> {
    [
        (BASE_URL_COOKIE, credentials.base_url.as_str()),
        (API_KEY_COOKIE, credentials.api_key.as_str()),
        (MODEL_COOKIE, credentials.model.as_str()),
    ]
    .into_iter()
    .map(|(name, value)| {
        let encoded = encode(value);
        let mut cookie = format!(
            "{name}={encoded}; Path=/; Max-Age={}; SameSite=Strict",
            config.cookie_max_age_secs
        );
        if config.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| ServerError::Internal(format!("invalid cookie header: {}", e)))
    })
    .collect()
}
