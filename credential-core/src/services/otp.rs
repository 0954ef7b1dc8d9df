//! One-time passcode issuance and verification.
//!
//! Proof of possession of an email address or phone number, and the gate in
//! front of password reset. Codes are short-lived, single-use and bounded by
//! an attempt cap.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::OtpConfig;
use crate::error::CoreError;
use crate::models::{OtpChannel, OtpPurpose, OtpRecord};
use crate::services::notification::{EmailTemplate, NotificationProvider};
use crate::services::store::OtpStore;

/// Outcome of a successful send.
#[derive(Debug)]
pub struct OtpReceipt {
    pub otp_id: Uuid,
    pub channel: OtpChannel,
    pub expires_in: i64,
}

pub struct OtpEngine {
    config: OtpConfig,
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn NotificationProvider>,
}

impl OtpEngine {
    pub fn new(
        config: OtpConfig,
        store: Arc<dyn OtpStore>,
        notifier: Arc<dyn NotificationProvider>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    /// Generate, persist and dispatch a code for `(target, purpose)`.
    ///
    /// The record is persisted before dispatch and survives a dispatch
    /// failure, so a code that did reach the client stays verifiable; the
    /// provider error is still surfaced for the caller to report.
    #[tracing::instrument(skip(self), fields(purpose = %purpose.as_str()))]
    pub async fn send(
        &self,
        target: &str,
        purpose: OtpPurpose,
        user_id: Option<Uuid>,
    ) -> Result<OtpReceipt, CoreError> {
        let channel = OtpChannel::for_target(target).ok_or_else(|| {
            CoreError::Validation(
                "target is neither an email address nor an E.164 phone number".to_string(),
            )
        })?;

        let enabled = match channel {
            OtpChannel::Email => self.config.email_enabled,
            OtpChannel::Sms => self.config.sms_enabled,
        };
        if !enabled {
            return Err(CoreError::FeatureDisabled(channel.as_str().to_string()));
        }

        let code = generate_code(self.config.code_length);
        let record = OtpRecord::new(
            target.to_string(),
            user_id,
            purpose.clone(),
            &code,
            self.config.ttl,
        );
        let otp_id = record.id;

        // New code supersedes any pending one for the same target+purpose.
        self.store.create_superseding(&record).await?;

        tracing::info!(otp_id = %otp_id, channel = %channel.as_str(), "Verification code issued");

        self.dispatch(channel, target, &purpose, &code).await?;

        Ok(OtpReceipt {
            otp_id,
            channel,
            expires_in: self.config.ttl.num_seconds(),
        })
    }

    /// Verify a submitted code against the newest pending record.
    ///
    /// Absence forces a fresh send rather than indefinite retry of a stale
    /// code; the attempt cap converts a brute-force run into hard failures
    /// that also require a resend.
    #[tracing::instrument(skip(self, submitted), fields(purpose = %purpose.as_str()))]
    pub async fn verify(
        &self,
        target: &str,
        purpose: OtpPurpose,
        submitted: &str,
    ) -> Result<OtpRecord, CoreError> {
        let record = self
            .store
            .find_newest_pending(target, &purpose)
            .await?
            .ok_or(CoreError::OtpNotFound)?;

        if record.is_expired() {
            return Err(CoreError::OtpExpired);
        }

        if record.attempts >= self.config.max_attempts {
            tracing::warn!(otp_id = %record.id, "Verification attempt cap reached");
            return Err(CoreError::OtpAttemptsExceeded);
        }

        let submitted_hash = OtpRecord::hash_code(submitted);
        let matched: bool = submitted_hash
            .as_bytes()
            .ct_eq(record.code_hash.as_bytes())
            .into();

        let updated = self
            .store
            .record_attempt(record.id, matched)
            .await?
            .ok_or(CoreError::OtpNotFound)?;

        if !matched {
            tracing::info!(otp_id = %record.id, attempts = updated.attempts, "Verification code mismatch");
            return Err(CoreError::OtpMismatch);
        }

        tracing::info!(otp_id = %record.id, "Verification code accepted");
        Ok(updated)
    }

    /// Delete expired, unverified records. Routine maintenance, not a
    /// correctness requirement.
    pub async fn purge_expired(&self) -> Result<u64, CoreError> {
        let deleted = self.store.delete_expired().await?;
        if deleted > 0 {
            tracing::debug!(deleted, "Purged expired verification codes");
        }
        Ok(deleted)
    }

    async fn dispatch(
        &self,
        channel: OtpChannel,
        target: &str,
        purpose: &OtpPurpose,
        code: &str,
    ) -> Result<(), CoreError> {
        match channel {
            OtpChannel::Email => {
                let template = match purpose {
                    OtpPurpose::PasswordReset => EmailTemplate::PasswordResetCode,
                    _ => EmailTemplate::VerificationCode,
                };
                let mut variables = HashMap::new();
                variables.insert("code".to_string(), code.to_string());
                variables.insert(
                    "expires_minutes".to_string(),
                    self.config.ttl.num_minutes().to_string(),
                );
                self.notifier.send_email(target, template, variables).await
            }
            OtpChannel::Sms => {
                let message = format!(
                    "{} is your verification code. It expires in {} minutes.",
                    code,
                    self.config.ttl.num_minutes()
                );
                self.notifier.send_sms(target, &message).await
            }
        }
    }
}

/// Spawn the periodic cleanup sweep. Delete-only; never blocks live
/// verification traffic.
pub fn spawn_cleanup(engine: Arc<OtpEngine>, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.purge_expired().await {
                tracing::error!(error = %e, "Verification code cleanup sweep failed");
            }
        }
    })
}

/// Fixed-length numeric code with each digit drawn uniformly from a CSPRNG;
/// `gen_range` is unbiased, so no modulo skew.
fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| rng.gen_range(0..10).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_length_and_charset() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_code_varies() {
        let codes: std::collections::HashSet<String> =
            (0..20).map(|_| generate_code(8)).collect();
        assert!(codes.len() > 1);
    }
}
