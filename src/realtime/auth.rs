//! Session authentication
//!
//! Credential tokens arrive as a query parameter on the upgrade request
//! and must verify before a session reaches ready. Verification is
//! stateless; the identity service that issued the token is an external
//! collaborator.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{RealtimeError, RealtimeResult};
use super::UserId;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Authenticated user
    #[serde(rename = "userId")]
    pub user_id: UserId,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

/// Resolves handshake tokens to users
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and return the user it authenticates
    fn verify(&self, token: &str) -> RealtimeResult<UserId>;
}

/// HS256 JWT verification
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a token for a user
    ///
    /// The platform's identity service normally does this; it lives here
    /// for tools and tests.
    pub fn issue(&self, user_id: UserId, ttl: Duration) -> RealtimeResult<String> {
        let claims = SessionClaims {
            user_id,
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| RealtimeError::Internal(format!("Token encoding failed: {}", e)))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> RealtimeResult<UserId> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    RealtimeError::AuthFailed("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    RealtimeError::AuthFailed("Invalid signature".to_string())
                }
                _ => RealtimeError::AuthFailed("Malformed token".to_string()),
            })?;

        Ok(token_data.claims.user_id)
    }
}

/// Fixed token table, for tests and local development
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, user_id: UserId) -> Self {
        self.tokens.insert(token.to_string(), user_id);
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> RealtimeResult<UserId> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| RealtimeError::AuthFailed("Unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let verifier = JwtVerifier::new("test_secret_key_for_testing_only");

        let token = verifier.issue(42, Duration::minutes(15)).unwrap();
        assert_eq!(token.split('.').count(), 3);

        assert_eq!(verifier.verify(&token).unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtVerifier::new("secret_one");
        let verifier = JwtVerifier::new("secret_two");

        let token = issuer.issue(42, Duration::minutes(15)).unwrap();

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(RealtimeError::AuthFailed(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new("test_secret");

        // Encode claims that expired an hour ago
        let claims = SessionClaims {
            user_id: 42,
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(RealtimeError::AuthFailed(message)) if message == "Token expired"));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = JwtVerifier::new("test_secret");
        assert!(verifier.verify("not.a.token").is_err());
        assert!(verifier.verify("").is_err());
    }

    #[test]
    fn test_static_verifier() {
        let verifier = StaticTokenVerifier::new()
            .with_token("alpha", 1)
            .with_token("beta", 2);

        assert_eq!(verifier.verify("alpha").unwrap(), 1);
        assert_eq!(verifier.verify("beta").unwrap(), 2);
        assert!(verifier.verify("gamma").is_err());
    }
}
