//! Database entity models used by the repository.

use chrono::NaiveDateTime;

/// One persisted bearer credential, keyed by its storage key.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredCredential {
    pub key: String,
    pub token: String,
    pub updated_at: NaiveDateTime,
}
