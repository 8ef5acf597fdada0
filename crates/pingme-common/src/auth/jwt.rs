//! JWT-backed identity verification
//!
//! The default `IdentityProvider` implementation. Token issuance lives here
//! too so the surrounding application (and the test suite) can mint tokens
//! against the same secret.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use pingme_core::{DeliveryError, IdentityProvider, UserId};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Get the user ID carried in the subject
    ///
    /// # Errors
    /// Returns an error if the subject is not a numeric user id.
    pub fn user_id(&self) -> Result<UserId, DeliveryError> {
        self.sub
            .parse::<i64>()
            .map(UserId::new)
            .map_err(|_| DeliveryError::Auth("malformed subject claim".to_string()))
    }

    /// Check if the token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Issues and verifies bearer tokens for gateway handshakes
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry: i64,
}

impl JwtAuthenticator {
    /// Create a new authenticator with the given secret and token lifetime
    /// in seconds
    #[must_use]
    pub fn new(secret: &str, token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry,
        }
    }

    /// Issue a token for a user
    ///
    /// # Errors
    /// Returns an error if token encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.token_expiry)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("failed to encode JWT")))
    }

    /// Decode and validate a token, returning the authenticated user
    ///
    /// # Errors
    /// Returns `DeliveryError::Auth` if the token is invalid or expired.
    pub fn verify(&self, token: &str) -> Result<UserId, DeliveryError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let validation = Validation::default();
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        DeliveryError::Auth("token expired".to_string())
                    }
                    _ => DeliveryError::Auth("invalid token".to_string()),
                }
            })?;

        token_data.claims.user_id()
    }
}

#[async_trait]
impl IdentityProvider for JwtAuthenticator {
    async fn verify_token(&self, token: &str) -> Result<UserId, DeliveryError> {
        self.verify(token)
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("token_expiry", &self.token_expiry)
            .finish_non_exhaustive()
    }
}
