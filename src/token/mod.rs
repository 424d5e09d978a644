// ==============================================================================
// token/mod.rs - Bearer Credential Service
// ==============================================================================
// Description: Issues, validates and revokes signed bearer credentials
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Credential format:
//   base64url(JSON claims) "." base64url(HMAC-SHA256(secret, encoded claims))
//
//   claims = { sub, iat, exp, jti }   (iat/exp in Unix seconds)
//
// Validation order: structure -> signature -> claim sanity -> expiry ->
// revocation. Signatures are compared in constant time by `Mac::verify_slice`.
// ==============================================================================

pub mod revocation;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::GovernanceConfig;
use crate::error::{ApiError, AuthError};

pub use revocation::RevocationStore;

type HmacSha256 = Hmac<Sha256>;

/// Wire payload of a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RawClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

/// Verified identity carried by a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub token_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Freshly issued credential
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    secret: Vec<u8>,
    ttl: TimeDelta,
    revocations: Arc<RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        config: &GovernanceConfig,
        revocations: Arc<RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            ttl: TimeDelta::from_std(config.token_ttl).unwrap_or(TimeDelta::MAX),
            revocations,
            clock,
        }
    }

    pub fn revocations(&self) -> &Arc<RevocationStore> {
        &self.revocations
    }

    /// Issue a credential for `subject`
    ///
    /// # Errors
    ///
    /// `ApiError::Internal` if the secret is unusable or the expiry
    /// overflows.
    pub fn issue(&self, subject: &str) -> Result<IssuedToken, ApiError> {
        let now = self.clock.now();
        let issued_at = truncate_to_secs(now);
        let expires_at = now
            .checked_add_signed(self.ttl)
            .and_then(ceil_to_secs)
            .ok_or_else(|| ApiError::Internal("token expiry overflow".to_string()))?;

        let claims = RawClaims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| ApiError::Internal(format!("failed to encode claims: {}", e)))?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.sign(encoded.as_bytes())?;

        debug!(token_id = %claims.jti, "Issued credential");

        Ok(IssuedToken {
            token: format!("{}.{}", encoded, URL_SAFE_NO_PAD.encode(signature)),
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Verify signature, expiry and revocation status
    pub fn validate(&self, credential: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(credential)?;

        if self.clock.now() >= claims.expires_at {
            return Err(AuthError::Expired);
        }

        if self.revocations.contains(&claims.token_id) {
            return Err(AuthError::Revoked);
        }

        Ok(claims)
    }

    /// Revoke a credential until its natural expiry
    ///
    /// Only the structure and signature must be valid. Revoking an expired or
    /// already revoked credential succeeds without changing anything.
    pub fn revoke(&self, credential: &str) -> Result<(), AuthError> {
        let claims = self.verify(credential)?;
        let now = self.clock.now();

        if now >= claims.expires_at {
            debug!(token_id = %claims.token_id, "Revoke of expired credential ignored");
            return Ok(());
        }

        self.revocations.add(claims.token_id, claims.expires_at, now);
        info!(token_id = %claims.token_id, "Credential revoked");

        Ok(())
    }

    /// Structural and signature check, no time-dependent checks
    fn verify(&self, credential: &str) -> Result<Claims, AuthError> {
        let (encoded, signature) = credential.split_once('.').ok_or(AuthError::Malformed)?;
        if encoded.is_empty() || signature.contains('.') {
            return Err(AuthError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::Malformed)?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::Malformed)?;
        let raw: RawClaims = serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

        if raw.exp <= raw.iat {
            return Err(AuthError::Malformed);
        }

        let issued_at = DateTime::from_timestamp(raw.iat, 0).ok_or(AuthError::Malformed)?;
        let expires_at = DateTime::from_timestamp(raw.exp, 0).ok_or(AuthError::Malformed)?;

        Ok(Claims {
            subject: raw.sub,
            token_id: raw.jti,
            issued_at,
            expires_at,
        })
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, ApiError> {
        if self.secret.is_empty() {
            return Err(ApiError::Internal("signing secret is empty".to_string()));
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::Internal(format!("invalid signing key: {}", e)))?;
        mac.update(data);

        Ok(mac.finalize().into_bytes().to_vec())
    }
}

// Claims carry whole seconds. `iat` rounds down and `exp` rounds up, so a
// credential is never honored for less than the configured TTL.
fn truncate_to_secs(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

fn ceil_to_secs(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let floor = truncate_to_secs(t);
    if floor == t {
        Some(t)
    } else {
        floor.checked_add_signed(TimeDelta::seconds(1))
    }
}
