//! Basic authentication for operator endpoints.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ServerConfig;

/// True only when credentials are configured and the request carries them.
pub(crate) fn authorized(headers: &HeaderMap, config: &ServerConfig) -> bool {
    config.auth_enabled() && check_basic_auth(headers, config)
}

fn check_basic_auth(headers: &HeaderMap, config: &ServerConfig) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Some(decoded) = base64_decode(encoded.trim()) else {
        return false;
    };

    decoded == format!("{}:{}", config.username, config.password)
}

/// Standard-alphabet base64, padding optional. `None` on any invalid byte.
fn base64_decode(input: &str) -> Option<String> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let input = input.trim_end_matches('=');
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut buf = 0u32;
    let mut bits = 0;

    for c in input.bytes() {
        let val = ALPHABET.iter().position(|&x| x == c)? as u32;
        buf = (buf << 6) | val;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xFF) as u8);
        }
    }

    String::from_utf8(out).ok()
}

pub(crate) fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"hmt-gateway\"")],
        "Unauthorized",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> ServerConfig {
        ServerConfig {
            username: "ops".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(base64_decode("b3BzOnNlY3JldA==").as_deref(), Some("ops:secret"));
        assert_eq!(base64_decode("YQ").as_deref(), Some("a"));
        assert_eq!(base64_decode("b3Bz*"), None);
    }

    #[test]
    fn test_basic_auth() {
        let config = config();
        // "ops:secret"
        assert!(authorized(&headers("Basic b3BzOnNlY3JldA=="), &config));
        // "ops:wrong"
        assert!(!authorized(&headers("Basic b3BzOndyb25n"), &config));
        assert!(!authorized(&headers("Bearer b3BzOnNlY3JldA=="), &config));
        assert!(!authorized(&HeaderMap::new(), &config));
    }

    #[test]
    fn test_unconfigured_credentials_reject_everything() {
        let config = ServerConfig::default();
        assert!(!authorized(&HeaderMap::new(), &config));
        // ":" decodes to the empty username and password
        assert!(!authorized(&headers("Basic Og=="), &config));
    }
}
