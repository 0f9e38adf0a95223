// src/session.rs
use serde::{Deserialize, Serialize};

/// The logged-in dashboard user, supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

impl UserSession {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Two sessions refer to the same user when their ids match; display name is cosmetic.
    pub fn same_user(&self, other: &UserSession) -> bool {
        self.id == other.id
    }

    /// Short anonymised id for logs. Raw user ids never go to the log.
    pub fn log_id(&self) -> String {
        anon_hash(&self.id)
    }
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
