//! Bearer token authentication shared by the API middleware and admin handlers.
//!
//! With a token configured, `Authorization: Bearer <token>` is required.
//! Without one, only loopback clients are accepted.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use super::problem_details::ProblemDetails;
use crate::server::AppState;

/// Check a request against an optional token.
///
/// Tokens are compared through their SHA-256 digests so the comparison time
/// does not depend on how much of the token matched.
pub fn is_authorized(token: &Option<String>, addr: &SocketAddr, headers: &HeaderMap) -> bool {
    let Some(expected) = token else {
        return addr.ip().is_loopback();
    };

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|provided| Sha256::digest(provided) == Sha256::digest(expected))
}

/// Middleware guarding `/api/v1/*`.
pub async fn require_api_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if is_authorized(&state.api_token, &addr, request.headers()) {
        next.run(request).await
    } else {
        ProblemDetails::new(
            axum::http::StatusCode::UNAUTHORIZED,
            "missing or invalid bearer token",
        )
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn addr(ip: &str) -> SocketAddr {
        format!("{ip}:5000").parse().unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn no_token_allows_only_loopback() {
        assert!(is_authorized(&None, &addr("127.0.0.1"), &HeaderMap::new()));
        assert!(!is_authorized(&None, &addr("10.0.0.8"), &HeaderMap::new()));
    }

    #[test]
    fn token_must_match_from_any_address() {
        let token = Some("s3cret".to_string());
        assert!(is_authorized(&token, &addr("10.0.0.8"), &bearer("s3cret")));
        assert!(!is_authorized(&token, &addr("127.0.0.1"), &bearer("wrong")));
        assert!(!is_authorized(&token, &addr("127.0.0.1"), &HeaderMap::new()));
    }
}
