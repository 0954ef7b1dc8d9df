use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Password credential for a portal user.
///
/// `password_hash` is a PHC-format argon2id string produced by the
/// credential vault. The cleartext password never persists anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: Uuid,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(user_id: Uuid, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the stored hash after a password change.
    pub fn rotate(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }
}
