use thiserror::Error;

/// Error taxonomy for the credential core.
///
/// Messages stay generic on purpose: no raw secrets, no OTP codes, no
/// plaintext of encrypted fields. Structured detail belongs in tracing
/// fields and audit events, not in the error string handed to a client.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Ciphertext integrity check failed")]
    Integrity,

    #[error("No pending verification code")]
    OtpNotFound,

    #[error("Verification code expired")]
    OtpExpired,

    #[error("Verification code mismatch")]
    OtpMismatch,

    #[error("Maximum verification attempts exceeded")]
    OtpAttemptsExceeded,

    #[error("Channel disabled: {0}")]
    FeatureDisabled(String),

    #[error("Notification provider error: {0}")]
    Provider(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable kind label for structured logging and audit metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Configuration(_) => "configuration",
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::InvalidToken => "invalid_token",
            CoreError::TokenExpired => "token_expired",
            CoreError::TokenRevoked => "token_revoked",
            CoreError::Integrity => "integrity",
            CoreError::OtpNotFound => "otp_not_found",
            CoreError::OtpExpired => "otp_expired",
            CoreError::OtpMismatch => "otp_mismatch",
            CoreError::OtpAttemptsExceeded => "otp_attempts_exceeded",
            CoreError::FeatureDisabled(_) => "feature_disabled",
            CoreError::Provider(_) => "provider",
            CoreError::PermissionDenied => "permission_denied",
            CoreError::Validation(_) => "validation",
            CoreError::Storage(_) => "storage",
            CoreError::Internal(_) => "internal",
        }
    }
}
