//! Caller identity extraction.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::USER_IDENT_HEADER;
use crate::storage::Actor;

/// Reads the actor from `X-User-Ident`. Missing or blank means anonymous.
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ident = parts
            .headers
            .get(USER_IDENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        Ok(ident.map(Actor::new).unwrap_or_else(Actor::anonymous))
    }
}
