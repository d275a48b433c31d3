use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::core::config::AuthConfig;
use crate::models::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Identity of the caller, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
}

pub struct AuthManager {
    enabled: bool,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    dev_subject: String,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Result<Self, jsonwebtoken::errors::Error> {
        let (decoding, validation) = match config.public_key_pem.as_deref() {
            Some(pem) if !pem.trim().is_empty() => (
                DecodingKey::from_rsa_pem(pem.as_bytes())?,
                Validation::new(Algorithm::RS256),
            ),
            _ => (
                DecodingKey::from_secret(config.secret_key.as_bytes()),
                Validation::new(Algorithm::HS256),
            ),
        };

        Ok(Self {
            enabled: config.enabled,
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding,
            validation,
            dev_subject: config.dev_subject.clone(),
        })
    }

    pub fn generate_token(
        &self,
        subject: &str,
        expiry_hours: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::hours(expiry_hours);

        let claims = Claims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    /// Resolve the caller's subject from the `Authorization` header
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, ApiError> {
        if !self.enabled {
            return Ok(AuthenticatedUser {
                subject: self.dev_subject.clone(),
            });
        }

        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".into()))?;

        if token.is_empty() {
            return Err(ApiError::Unauthorized("Empty bearer token".into()));
        }

        let claims = self.verify_token(token).map_err(|e| {
            debug!("Token rejected: {}", e);
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthorized("Token has no subject".into()));
        }

        Ok(AuthenticatedUser {
            subject: claims.sub,
        })
    }
}

pub async fn require_auth(
    State(auth): State<Arc<AuthManager>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = auth.authenticate(req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
