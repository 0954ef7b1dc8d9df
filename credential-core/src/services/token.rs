//! Session issuance and revocation with the two-token model.
//!
//! Access tokens are short-lived HS256 claim bundles verified by signature
//! and expiry alone, with no store round-trip; staleness is bounded by the
//! access TTL. Refresh tokens are opaque high-entropy values whose keyed
//! hash is persisted, rotated on every use.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::CoreError;
use crate::models::RefreshToken;
use crate::services::store::{RefreshTokenStore, RoleDirectory};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Permission snapshot resolved at issue time
    pub perms: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token ID
    pub jti: String,
}

/// Token pair handed to the cookie layer.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    refresh_hash_key: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store: Arc<dyn RefreshTokenStore>,
    roles: Arc<dyn RoleDirectory>,
}

impl TokenService {
    pub fn new(
        config: &TokenConfig,
        store: Arc<dyn RefreshTokenStore>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.access_secret.expose_secret().as_bytes()),
            decoding_key: DecodingKey::from_secret(config.access_secret.expose_secret().as_bytes()),
            refresh_hash_key: config.refresh_secret.expose_secret().as_bytes().to_vec(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            store,
            roles,
        }
    }

    /// Issue a fresh access/refresh pair for a user.
    ///
    /// The permission snapshot is resolved here, per issuance, so a role
    /// change is picked up no later than the next access-token lifetime.
    pub async fn issue(&self, user_id: Uuid) -> Result<TokenPair, CoreError> {
        let permissions = self.roles.permissions_for_user(user_id).await?;
        let access_token = self.sign_access_token(user_id, permissions.codes())?;

        let raw_refresh = generate_refresh_value();
        let row = RefreshToken::new(
            user_id,
            self.hash_refresh_value(&raw_refresh),
            self.refresh_ttl,
        );
        self.store.create(&row).await?;

        tracing::debug!(user_id = %user_id, token_id = %row.id, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token: raw_refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Rotate a refresh token: revoke the presented row and issue a new
    /// pair.
    ///
    /// Revocation is a conditional update on the storage side, so two
    /// concurrent refreshes of the same raw value resolve to exactly one
    /// winner; the loser observes the row already revoked.
    pub async fn refresh(&self, raw_refresh: &str) -> Result<TokenPair, CoreError> {
        let token_hash = self.hash_refresh_value(raw_refresh);

        let row = self
            .store
            .find_by_hash(&token_hash)
            .await?
            .ok_or(CoreError::InvalidToken)?;

        if row.is_revoked() {
            tracing::warn!(user_id = %row.user_id, token_id = %row.id, "Refresh with revoked token");
            return Err(CoreError::TokenRevoked);
        }

        if row.is_expired() {
            return Err(CoreError::TokenExpired);
        }

        if !self.store.revoke_active_by_hash(&token_hash).await? {
            // Lost the rotation race: someone else already spent this token.
            tracing::warn!(user_id = %row.user_id, token_id = %row.id, "Concurrent refresh detected");
            return Err(CoreError::TokenRevoked);
        }

        self.issue(row.user_id).await
    }

    /// Revoke the presented refresh token (logout). Idempotent for a row
    /// that is already revoked; unknown values are rejected.
    pub async fn revoke(&self, raw_refresh: &str) -> Result<(), CoreError> {
        let token_hash = self.hash_refresh_value(raw_refresh);

        let row = self
            .store
            .find_by_hash(&token_hash)
            .await?
            .ok_or(CoreError::InvalidToken)?;

        self.store.revoke_active_by_hash(&token_hash).await?;
        tracing::info!(user_id = %row.user_id, token_id = %row.id, "Refresh token revoked");
        Ok(())
    }

    /// Revoke every session for a user (password change, suspected
    /// compromise).
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, CoreError> {
        let revoked = self.store.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "All sessions revoked for user");
        Ok(revoked)
    }

    /// Validate an access token by signature and expiry alone.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, CoreError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => CoreError::TokenExpired,
                    _ => CoreError::InvalidToken,
                }
            })?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    fn sign_access_token(&self, user_id: Uuid, perms: Vec<String>) -> Result<String, CoreError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            perms,
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// Keyed one-way digest of a raw refresh value for storage and lookup.
    fn hash_refresh_value(&self, raw: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.refresh_hash_key)
            .expect("HMAC accepts any key length");
        mac.update(raw.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// High-entropy opaque refresh value: 32 random bytes, hex-encoded.
fn generate_refresh_value() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{InMemoryRefreshTokenStore, InMemoryRoleDirectory};
    use secrecy::SecretString;

    fn test_service() -> TokenService {
        let config = TokenConfig {
            access_secret: SecretString::new("access-signing-secret-for-unit-tests!".to_string()),
            refresh_secret: SecretString::new("refresh-hashing-secret-for-unit-tests".to_string()),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        };
        TokenService::new(
            &config,
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::new(InMemoryRoleDirectory::new()),
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify_access_token() {
        let service = test_service();
        let user_id = Uuid::new_v4();

        let pair = service.issue(user_id).await.unwrap();
        assert!(!pair.access_token.is_empty());
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let claims = service.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.perms.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_value_is_high_entropy_hex() {
        let first = generate_refresh_value();
        let second = generate_refresh_value();
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_tampered_access_token_rejected() {
        let service = test_service();
        let pair = service.issue(Uuid::new_v4()).await.unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.pop();
        tampered.push('x');

        assert!(matches!(
            service.verify_access_token(&tampered),
            Err(CoreError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_classified() {
        let service = test_service();
        let now = Utc::now();
        let claims = AccessClaims {
            sub: Uuid::new_v4().to_string(),
            perms: vec![],
            // Well past any validation leeway
            exp: (now - Duration::hours(2)).timestamp(),
            iat: (now - Duration::hours(3)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("access-signing-secret-for-unit-tests!".as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.verify_access_token(&token),
            Err(CoreError::TokenExpired)
        ));
    }
}
