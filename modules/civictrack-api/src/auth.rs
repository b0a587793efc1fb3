use anyhow::Result;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use civictrack_common::CivicTrackError;
use civictrack_domains::User;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Verifies tokens minted by the identity provider (shared secret).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    pub fn create_token(&self, user_id: Uuid, is_admin: bool) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(24);

        let claims = Claims {
            sub: user_id.to_string(),
            is_admin,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the caller from the Authorization header. The token proves
/// identity; the user row is authoritative for admin/banned state.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, CivicTrackError> {
    let token = bearer_token(headers).ok_or(CivicTrackError::Unauthenticated)?;
    let claims = state
        .jwt
        .verify_token(token)
        .map_err(|_| CivicTrackError::Unauthenticated)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| CivicTrackError::Unauthenticated)?;

    User::find_by_id(user_id, &state.pool)
        .await?
        .ok_or(CivicTrackError::Unauthenticated)
}

pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, CivicTrackError> {
    let user = require_user(state, headers).await?;
    if !user.is_admin {
        return Err(CivicTrackError::Forbidden("Admin access required".into()));
    }
    Ok(user)
}
