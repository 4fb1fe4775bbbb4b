use axum::{
    extract::{FromRequestParts, FromRef},
    http::{header, request::Parts},
};
use crate::state::AppState;
use crate::domain::models::actor::{Actor, Claims};
use crate::error::AppError;
use std::sync::Arc;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, Span};

/// The authenticated caller, resolved from `Authorization: Bearer <jwt>`.
pub struct AuthActor(pub Actor);

impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts.headers.get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);
        let key = DecodingKey::from_secret(app_state.config.jwt_secret.as_bytes());

        let token_data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized
            })?;

        let actor = token_data.claims.into_actor().ok_or(AppError::Unauthorized)?;

        Span::current().record("user_id", actor.id());
        Span::current().record("role", actor.role());

        Ok(AuthActor(actor))
    }
}

/// Mints a token for `actor`. Issuance normally happens upstream; this serves tooling and tests.
pub fn issue_token(actor: &Actor, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let claims = Claims {
        sub: actor.id().to_string(),
        role: actor.role().to_string(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::InternalWithMsg(format!("Cannot sign token: {}", e)))
}
