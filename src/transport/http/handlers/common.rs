use crate::domain::identity::bearer_token;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

/// Bearer token from the `Authorization` header, if one is present and well-formed.
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}
