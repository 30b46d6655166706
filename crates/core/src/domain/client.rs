use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub email: String,
    pub normalized_email: String,
    pub phone: Option<String>,
    /// Argentine tax id, digits only once normalized.
    pub cuit: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub distance_km: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical email form used for matching: trimmed and lowercased. No
/// provider-specific rewriting (dots and plus tags are kept).
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Strips a CUIT down to its digits. `20-31234567-8` and `20312345678`
/// match the same client. Returns `None` when nothing digit-like remains.
pub fn normalize_cuit(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
