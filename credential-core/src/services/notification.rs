//! Abstract notification dispatch contract.
//!
//! The core only knows how to hand a code to a channel; template rendering
//! and provider selection (SMTP, SendGrid, Twilio) live with the host
//! service behind this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CoreError;

/// Template kinds the core can ask the provider to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    VerificationCode,
    PasswordResetCode,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::VerificationCode => "verification_code",
            EmailTemplate::PasswordResetCode => "password_reset_code",
        }
    }
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: HashMap<String, String>,
    ) -> Result<(), CoreError>;

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), CoreError>;
}

/// Dispatched message captured by the recording provider.
#[derive(Debug, Clone)]
pub enum SentMessage {
    Email {
        to: String,
        template: EmailTemplate,
        variables: HashMap<String, String>,
    },
    Sms {
        to: String,
        message: String,
    },
}

/// Recording provider for tests and local wiring: captures every dispatch
/// and can be flipped into a failing mode.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail_next: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next dispatch fail with a provider error.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn take_failure(&self) -> bool {
        let mut flag = self.fail_next.lock().unwrap();
        std::mem::take(&mut *flag)
    }
}

#[async_trait]
impl NotificationProvider for RecordingNotifier {
    async fn send_email(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: HashMap<String, String>,
    ) -> Result<(), CoreError> {
        if self.take_failure() {
            return Err(CoreError::Provider("email dispatch failed".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage::Email {
            to: to.to_string(),
            template,
            variables,
        });
        Ok(())
    }

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), CoreError> {
        if self.take_failure() {
            return Err(CoreError::Provider("sms dispatch failed".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage::Sms {
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
