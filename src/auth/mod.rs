/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWTs (HS256) identify the caller, their organization and their
 * roles. The auth middleware validates a presented token and stores the
 * resulting [`Principal`] in the request extensions; handlers take the
 * principal as an extractor and check it against the [`policy`] table.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::context::RequestContext;
use crate::errors::ServiceError;

pub mod policy;

pub use policy::{authorize, can_view_purchase_price, Operation, Resource};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // Subject (user ID)
    pub org: i32,           // Organization the user acts for
    pub roles: Vec<String>, // Role names
    pub iss: String,        // Issuer
    pub aud: String,        // Audience
    pub iat: i64,           // Issued at time
    pub exp: i64,           // Expiration time
}

/// Authenticated caller extracted from a validated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub organization_id: i32,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(policy::ADMIN_ROLE)
    }

    /// Request context passed to organization-scoped operations.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.organization_id, self.user_id.clone())
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            organization_id: claims.org,
            roles: claims.roles,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InternalError(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Issues and validates access tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs an access token for `user_id` acting for `organization_id`.
    pub fn issue_token(
        &self,
        user_id: &str,
        organization_id: i32,
        roles: &[&str],
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            org: organization_id,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::InternalError(format!("Failed to sign token: {}", e)))
    }

    /// Verifies signature, expiry, issuer and audience.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Validates a presented bearer token and attaches the [`Principal`].
///
/// Requests without a token pass through unauthenticated; an invalid token is
/// rejected outright.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(token) = bearer_token(request.headers()) {
        let claims = auth.validate_token(token).map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            e
        })?;
        debug!(user_id = %claims.sub, "Authenticated request");
        request.extensions_mut().insert(Principal::from(claims));
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "k8Jq2Lm4Np6Rs8Tv0Wx2Yz4Ab6Cd8Ef0Gh2Ij4Kl6Mn8Op0Qr2St4Uv6Wx8Yz0Ab2Cd";

    fn service(issuer: &str, audience: &str, ttl_secs: u64) -> AuthService {
        AuthService::new(AuthConfig::new(
            SECRET.to_string(),
            audience.to_string(),
            issuer.to_string(),
            Duration::from_secs(ttl_secs),
        ))
    }

    #[test]
    fn issued_token_round_trips_to_principal() {
        let auth = service("psi-api", "psi-admin", 600);
        let token = auth
            .issue_token("clerk-7", 3, &["receiving_view", "purchase_price_view"])
            .unwrap();

        let principal = Principal::from(auth.validate_token(&token).unwrap());
        assert_eq!(principal.user_id, "clerk-7");
        assert_eq!(principal.organization_id, 3);
        assert!(principal.has_role("purchase_price_view"));
        assert!(!principal.is_admin());
        assert_eq!(principal.context(), RequestContext::new(3, "clerk-7"));
    }

    #[test]
    fn token_for_other_audience_is_rejected() {
        let issuer = service("psi-api", "someone-else", 600);
        let token = issuer.issue_token("clerk", 1, &[]).unwrap();

        let verifier = service("psi-api", "psi-admin", 600);
        assert_matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service("psi-api", "psi-admin", 600);
        let mut token = auth.issue_token("clerk", 1, &["admin"]).unwrap();
        token.push('x');
        assert!(auth.validate_token(&token).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
