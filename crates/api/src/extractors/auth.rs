//! Bearer-token authentication extractor.
//!
//! Pulls the `Authorization: Bearer` header and resolves it into a verified
//! [`Identity`] through the configured resolver.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::identity::{Identity, ResolveError};

/// Required authentication: rejects the request with 401 when the
/// credential is missing or invalid.
#[derive(Debug, Clone)]
pub struct Auth(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        match state.identity.resolve(token).await {
            Ok(identity) => Ok(Auth(identity)),
            Err(ResolveError::Unauthorized) => Err(ApiError::Unauthorized(
                "Invalid or expired credential".to_string(),
            )),
            Err(ResolveError::Unavailable(reason)) => Err(ApiError::Internal(reason)),
        }
    }
}

/// Optional authentication: resolves the credential when one is present,
/// otherwise yields `None` without failing the request.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(OptionalAuth(None));
        };
        match state.identity.resolve(token).await {
            Ok(identity) => Ok(OptionalAuth(Some(identity))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}
