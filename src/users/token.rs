use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde_derive::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::types::ApiError;

pub const TOKEN_PREFIX: &str = "Token";
pub const ACCESS_PURPOSE: &str = "access";
pub const DEFAULT_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Unix seconds.
    pub exp: i64,
    /// Purpose marker, always `access` for tokens this service accepts.
    pub sub: String,
}

/// Issues and checks HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, ApiError> {
        let key = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| ApiError::Internal)?;
        Ok(TokenService { key })
    }

    pub fn issue(&self, username: &str, ttl: Option<Duration>) -> Result<String, ApiError> {
        self.issue_at(username, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        username: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let ttl = ttl.unwrap_or_else(|| Duration::minutes(DEFAULT_TTL_MINUTES));
        let claims = Claims {
            username: username.to_string(),
            exp: (now + ttl).timestamp(),
            sub: ACCESS_PURPOSE.to_string(),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, ApiError> {
        claims.sign_with_key(&self.key).map_err(|_| ApiError::Internal)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, ApiError> {
        let claims: Claims = token.verify_with_key(&self.key).map_err(|e| {
            debug!(error = %e, "token rejected");
            ApiError::auth("could not validate credentials")
        })?;

        if claims.sub != ACCESS_PURPOSE {
            return Err(ApiError::auth("token is not an access token"));
        }
        if now.timestamp() >= claims.exp {
            return Err(ApiError::auth("token has expired"));
        }
        Ok(claims)
    }
}

/// Parses `Token <jwt>`. A missing header is an error here; see
/// [`extract_bearer_optional`] for routes that accept anonymous callers.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.ok_or_else(|| ApiError::auth("missing authorization header"))?;
    match header.trim().split_once(' ') {
        Some((scheme, token)) if scheme == TOKEN_PREFIX && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ApiError::auth("invalid authorization type")),
    }
}

pub fn extract_bearer_optional(header: Option<&str>) -> Result<Option<&str>, ApiError> {
    match header {
        None => Ok(None),
        Some(_) => extract_bearer(header).map(Some),
    }
}
