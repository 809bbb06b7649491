use crate::error::HttpApiError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

/// The caller's generation credential from `Authorization: Bearer <key>`.
pub fn bearer_key(headers: &HeaderMap) -> Result<String, HttpApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| HttpApiError::unauthorized("Authorization header is missing"))?
        .to_str()
        .map_err(|_| HttpApiError::unauthorized("Authorization header is not valid text"))?;
    let (scheme, key) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| HttpApiError::unauthorized("expected 'Bearer <key>'"))?;
    let key = key.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || key.is_empty() {
        return Err(HttpApiError::unauthorized("expected 'Bearer <key>'"));
    }
    Ok(key.to_string())
}
