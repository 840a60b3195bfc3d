use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use fleetbook_core::{Actor, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Numeric user id, as a string
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl TryFrom<Claims> for Actor {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthenticationError("Invalid subject claim".to_string()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::AuthenticationError("Invalid role claim".to_string()))?;

        Ok(Actor::new(user_id, role))
    }
}

/// Signs an HS256 token for `actor`, valid for `ttl`.
pub fn issue_token(secret: &str, actor: &Actor, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: actor.user_id.to_string(),
        role: actor.role.to_string(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

// ============================================================================
// Actor Extractor
// ============================================================================

/// The authenticated caller, decoded from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthActor(pub Actor);

impl FromRequestParts<AppState> for AuthActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.auth.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

        Ok(AuthActor(Actor::try_from(token_data.claims)?))
    }
}
