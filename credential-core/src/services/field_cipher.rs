//! Field-level authenticated encryption for regulated columns.
//!
//! Protects individual string fields at rest (TFN, ABN, signature blobs,
//! third-party API secrets) with AES-256-GCM and provides a keyed blind
//! index for equality lookups over encrypted values.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use crate::config::EncryptionConfig;
use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Literal marker identifying an encrypted envelope. Stored values without
/// it are treated as legacy plaintext.
pub const ENVELOPE_PREFIX: &str = "enc:";

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const MASK_VISIBLE_CHARS: usize = 3;

/// Field cipher with an explicit mode.
///
/// `Unconfigured` makes the pass-through fallback a first-class, testable
/// state instead of an implicit runtime check: every operation on it is
/// identity. That mode exists to support incremental rollout over columns
/// that still hold plaintext; it is a deliberate compatibility compromise,
/// not a recommended deployment.
pub enum FieldCipher {
    Configured(ConfiguredCipher),
    Unconfigured,
}

pub struct ConfiguredCipher {
    key: [u8; KEY_SIZE],
}

impl FieldCipher {
    /// Build the cipher from configuration. A missing master secret selects
    /// pass-through mode; a short secret is rejected outright.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CoreError> {
        match &config.master_secret {
            Some(secret) => {
                let secret = secret.expose_secret();
                if secret.len() < KEY_SIZE {
                    return Err(CoreError::Configuration(anyhow::anyhow!(
                        "field encryption secret must be at least {} bytes",
                        KEY_SIZE
                    )));
                }
                Ok(FieldCipher::Configured(ConfiguredCipher {
                    key: derive_key(secret.as_bytes()),
                }))
            }
            None => {
                tracing::warn!("field cipher running unconfigured: values pass through in clear");
                Ok(FieldCipher::Unconfigured)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, FieldCipher::Configured(_))
    }

    /// Encrypt a field value into envelope form.
    ///
    /// Empty input and values already carrying the envelope marker pass
    /// through unchanged; in `Unconfigured` mode everything does.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CoreError> {
        if plaintext.is_empty() || plaintext.starts_with(ENVELOPE_PREFIX) {
            return Ok(plaintext.to_string());
        }

        match self {
            FieldCipher::Unconfigured => Ok(plaintext.to_string()),
            FieldCipher::Configured(cipher) => cipher.encrypt(plaintext),
        }
    }

    /// Decrypt an envelope back to the field value.
    ///
    /// Values without the envelope marker are legacy plaintext and pass
    /// through. A malformed envelope or failed authentication tag is an
    /// `Integrity` error, never silently returned as data.
    pub fn decrypt(&self, value: &str) -> Result<String, CoreError> {
        if !value.starts_with(ENVELOPE_PREFIX) {
            return Ok(value.to_string());
        }

        match self {
            FieldCipher::Unconfigured => Ok(value.to_string()),
            FieldCipher::Configured(cipher) => cipher.decrypt(value),
        }
    }

    /// Deterministic keyed hash for equality lookups over encrypted columns.
    ///
    /// Same plaintext, same hash; not invertible. Unavailable in
    /// pass-through mode, where columns hold plaintext and can be matched
    /// directly.
    pub fn blind_index(&self, plaintext: &str) -> Result<String, CoreError> {
        match self {
            FieldCipher::Unconfigured => Err(CoreError::Configuration(anyhow::anyhow!(
                "blind index requires a configured field encryption secret"
            ))),
            FieldCipher::Configured(cipher) => Ok(cipher.blind_index(plaintext)),
        }
    }

    /// Redacted display form: everything but the trailing characters is
    /// starred out. Envelopes are decrypted transparently first; values
    /// that cannot be decrypted mask fully.
    pub fn mask(&self, value: &str) -> String {
        let cleartext = match self.decrypt(value) {
            Ok(cleartext) => cleartext,
            Err(_) => return "***".to_string(),
        };

        let chars: Vec<char> = cleartext.chars().collect();
        if chars.len() <= MASK_VISIBLE_CHARS {
            return "*".repeat(chars.len().max(MASK_VISIBLE_CHARS));
        }

        let visible: String = chars[chars.len() - MASK_VISIBLE_CHARS..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - MASK_VISIBLE_CHARS), visible)
    }
}

impl ConfiguredCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        // Fresh random nonce per call; reuse under one key would void the
        // AEAD guarantees.
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CoreError::Internal(anyhow::anyhow!("field encryption failed")))?;

        // The AEAD output is ciphertext || tag; the envelope stores them as
        // separate hex segments.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}{}:{}:{}",
            ENVELOPE_PREFIX,
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    fn decrypt(&self, value: &str) -> Result<String, CoreError> {
        let body = &value[ENVELOPE_PREFIX.len()..];
        let segments: Vec<&str> = body.split(':').collect();
        if segments.len() != 3 {
            return Err(CoreError::Integrity);
        }

        let nonce_bytes = hex::decode(segments[0]).map_err(|_| CoreError::Integrity)?;
        let tag = hex::decode(segments[1]).map_err(|_| CoreError::Integrity)?;
        let ciphertext = hex::decode(segments[2]).map_err(|_| CoreError::Integrity)?;

        if nonce_bytes.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(CoreError::Integrity);
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| CoreError::Integrity)?;

        String::from_utf8(plaintext).map_err(|_| CoreError::Integrity)
    }

    fn blind_index(&self, plaintext: &str) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .expect("HMAC accepts any key length");
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Normalize an operator-supplied master secret of arbitrary length into a
/// fixed-size key.
fn derive_key(secret: &[u8]) -> [u8; KEY_SIZE] {
    let digest = Sha256::digest(secret);
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest);
    key
}
