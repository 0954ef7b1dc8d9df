use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use std::env;

use crate::error::CoreError;

/// Minimum byte length for signing and encryption secrets.
const MIN_SECRET_BYTES: usize = 32;

/// Immutable configuration for the credential core.
///
/// Constructed once at process start and passed by reference into each
/// component; there is no ambient global.
#[derive(Debug)]
pub struct CoreConfig {
    pub token: TokenConfig,
    pub encryption: EncryptionConfig,
    pub otp: OtpConfig,
}

#[derive(Debug)]
pub struct TokenConfig {
    /// HS256 signing secret for access tokens.
    pub access_secret: SecretString,
    /// Keys the HMAC under which refresh-token hashes are stored.
    pub refresh_secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug)]
pub struct EncryptionConfig {
    /// Master secret for field-level encryption. Absent means the cipher
    /// runs in pass-through mode.
    pub master_secret: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub code_length: usize,
    pub ttl: Duration,
    pub max_attempts: i32,
    pub email_enabled: bool,
    pub sms_enabled: bool,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        let config = CoreConfig {
            token: TokenConfig {
                access_secret: SecretString::new(get_env("ACCESS_TOKEN_SECRET", None)?),
                refresh_secret: SecretString::new(get_env("REFRESH_TOKEN_SECRET", None)?),
                access_ttl: parse_ttl(&get_env("ACCESS_TOKEN_TTL", Some("15m"))?)?,
                refresh_ttl: parse_ttl(&get_env("REFRESH_TOKEN_TTL", Some("7d"))?)?,
            },
            encryption: EncryptionConfig {
                master_secret: env::var("FIELD_ENCRYPTION_SECRET").ok().map(SecretString::new),
            },
            otp: OtpConfig {
                code_length: get_env("OTP_CODE_LENGTH", Some("6"))?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        CoreError::Configuration(anyhow::anyhow!("OTP_CODE_LENGTH: {}", e))
                    })?,
                ttl: parse_ttl(&get_env("OTP_TTL", Some("10m"))?)?,
                max_attempts: get_env("OTP_MAX_ATTEMPTS", Some("5"))?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        CoreError::Configuration(anyhow::anyhow!("OTP_MAX_ATTEMPTS: {}", e))
                    })?,
                email_enabled: get_env("OTP_EMAIL_ENABLED", Some("true"))?
                    .parse()
                    .unwrap_or(true),
                sms_enabled: get_env("OTP_SMS_ENABLED", Some("true"))?
                    .parse()
                    .unwrap_or(true),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_secret_length(&self.token.access_secret, "ACCESS_TOKEN_SECRET")?;
        require_secret_length(&self.token.refresh_secret, "REFRESH_TOKEN_SECRET")?;

        // The encryption secret is optional: absence degrades the field
        // cipher to pass-through, a short secret is a hard error.
        if let Some(secret) = &self.encryption.master_secret {
            require_secret_length(secret, "FIELD_ENCRYPTION_SECRET")?;
        } else {
            tracing::warn!(
                "FIELD_ENCRYPTION_SECRET not set: field encryption degrades to pass-through"
            );
        }

        if self.token.access_ttl <= Duration::zero() {
            return Err(CoreError::Configuration(anyhow::anyhow!(
                "ACCESS_TOKEN_TTL must be positive"
            )));
        }

        if self.token.refresh_ttl <= Duration::zero() {
            return Err(CoreError::Configuration(anyhow::anyhow!(
                "REFRESH_TOKEN_TTL must be positive"
            )));
        }

        if self.otp.code_length < 4 || self.otp.code_length > 10 {
            return Err(CoreError::Configuration(anyhow::anyhow!(
                "OTP_CODE_LENGTH must be between 4 and 10"
            )));
        }

        if self.otp.max_attempts <= 0 {
            return Err(CoreError::Configuration(anyhow::anyhow!(
                "OTP_MAX_ATTEMPTS must be positive"
            )));
        }

        Ok(())
    }
}

fn require_secret_length(secret: &SecretString, key: &str) -> Result<(), CoreError> {
    if secret.expose_secret().len() < MIN_SECRET_BYTES {
        return Err(CoreError::Configuration(anyhow::anyhow!(
            "{} must be at least {} bytes",
            key,
            MIN_SECRET_BYTES
        )));
    }
    Ok(())
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, CoreError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(CoreError::Configuration(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

/// Parse a TTL string of the form `30s`, `15m`, `2h` or `7d`.
pub fn parse_ttl(value: &str) -> Result<Duration, CoreError> {
    let value = value.trim();
    let (amount, unit) = value.split_at(value.len().saturating_sub(1));
    let count: i64 = amount.parse().map_err(|_| {
        CoreError::Configuration(anyhow::anyhow!("invalid TTL value: {}", value))
    })?;

    match unit {
        "s" => Ok(Duration::seconds(count)),
        "m" => Ok(Duration::minutes(count)),
        "h" => Ok(Duration::hours(count)),
        "d" => Ok(Duration::days(count)),
        _ => Err(CoreError::Configuration(anyhow::anyhow!(
            "invalid TTL unit in {}: expected s, m, h or d",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CoreConfig {
        CoreConfig {
            token: TokenConfig {
                access_secret: SecretString::new("a".repeat(32)),
                refresh_secret: SecretString::new("r".repeat(32)),
                access_ttl: Duration::minutes(15),
                refresh_ttl: Duration::days(7),
            },
            encryption: EncryptionConfig {
                master_secret: Some(SecretString::new("m".repeat(32))),
            },
            otp: OtpConfig {
                code_length: 6,
                ttl: Duration::minutes(10),
                max_attempts: 5,
                email_enabled: true,
                sms_enabled: true,
            },
        }
    }

    #[test]
    fn test_parse_ttl_units() {
        assert_eq!(parse_ttl("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_ttl("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_ttl("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_ttl("7d").unwrap(), Duration::days(7));
    }

    #[test]
    fn test_parse_ttl_rejects_garbage() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("15").is_err());
        assert!(parse_ttl("m15").is_err());
        assert!(parse_ttl("15w").is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_short_signing_secret_rejected() {
        let mut config = test_config();
        config.token.access_secret = SecretString::new("short".to_string());
        assert!(matches!(
            config.validate(),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_short_encryption_secret_rejected() {
        let mut config = test_config();
        config.encryption.master_secret = Some(SecretString::new("short".to_string()));
        assert!(matches!(
            config.validate(),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_absent_encryption_secret_allowed() {
        let mut config = test_config();
        config.encryption.master_secret = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_code_length_rejected() {
        let mut config = test_config();
        config.otp.code_length = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::Configuration(_))
        ));
    }
}
