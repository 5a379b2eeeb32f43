use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use civicdesk_common::CivicDeskError;
use civicdesk_engine::Caller;

use crate::error::ApiError;
use crate::AppState;

const TOKEN_DURATION_SECS: i64 = 24 * 3600; // 24 hours

/// Verifies a bearer credential and yields the caller's email. The identity
/// provider itself lives outside this service; only verification happens here.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, CivicDeskError>;
}

/// JWT Claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 token service sharing a secret with the sign-in frontend.
#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create a token for an email. Used by tests and operational tooling.
    pub fn create_token(&self, email: &str) -> anyhow::Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            email: email.to_string(),
            exp: (now + chrono::Duration::seconds(TOKEN_DURATION_SECS)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }
}

#[async_trait]
impl TokenVerifier for JwtAuth {
    async fn verify(&self, token: &str) -> Result<String, CivicDeskError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims.email)
            .map_err(|_| CivicDeskError::Unauthorized)
    }
}

/// Authenticated caller. Extract this in handlers that require auth: reads
/// the bearer token, verifies it, and resolves the caller's role from the
/// user table (None when no profile exists yet).
pub struct AuthedCaller(pub Caller);

impl FromRequestParts<Arc<AppState>> for AuthedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(CivicDeskError::Unauthorized)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(CivicDeskError::Unauthorized)?;

        let email = state.verifier.verify(token).await?;
        let role = state
            .users
            .find_by_email(&email)
            .await?
            .map(|user| user.role);
        Ok(AuthedCaller(Caller::new(&email, role)))
    }
}
