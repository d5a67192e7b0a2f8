//! Bearer token helpers: header parsing, minting, log-safe fingerprints.
use axum::http::{HeaderMap, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Extract `<token>` from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. A missing header, another
/// scheme, an empty token or a token containing whitespace all yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// New opaque session token (UUIDv4, 122 random bits).
pub fn mint_token() -> String {
    Uuid::new_v4().to_string()
}

/// Short stable identifier for a token, safe to write to logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..8])
}
