//! One-time passcode records bound to a target and purpose.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What a code proves once verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PhoneVerification,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "email_verification",
            OtpPurpose::PhoneVerification => "phone_verification",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

/// Delivery channel, classified from the target identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Email,
    Sms,
}

impl OtpChannel {
    /// Classify a target as an email address or an E.164 phone number.
    pub fn for_target(target: &str) -> Option<OtpChannel> {
        if target.contains('@') && target.contains('.') {
            Some(OtpChannel::Email)
        } else if target.starts_with('+') && target.len() >= 10 {
            Some(OtpChannel::Sms)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Email => "email",
            OtpChannel::Sms => "sms",
        }
    }
}

/// One-time passcode record.
///
/// The code itself is stored as a SHA-256 hex digest, never in clear. A
/// record is pending until it is verified or expires; at most one pending
/// record is considered per `(target, purpose)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: Uuid,
    pub target: String,
    pub user_id: Option<Uuid>,
    pub code_hash: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub attempts: i32,
}

impl OtpRecord {
    pub fn new(
        target: String,
        user_id: Option<Uuid>,
        purpose: OtpPurpose,
        code: &str,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target,
            user_id,
            code_hash: Self::hash_code(code),
            purpose,
            expires_at: now + ttl,
            created_at: now,
            verified_at: None,
            attempts: 0,
        }
    }

    /// Digest a code for storage and comparison.
    pub fn hash_code(code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    /// Still eligible for verification.
    pub fn is_pending(&self) -> bool {
        !self.is_verified() && !self.is_expired()
    }
}
