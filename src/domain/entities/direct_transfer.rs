use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mediated person-to-person file drop. Metadata lives in one JSON file;
/// the payload is a sibling file named `stored_filename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectTransfer {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub filename: String,
    pub stored_filename: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl DirectTransfer {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Incoming,
    Outgoing,
}

impl TransferDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incoming" => Some(TransferDirection::Incoming),
            "outgoing" => Some(TransferDirection::Outgoing),
            _ => None,
        }
    }
}

/// The action label recorded when a transfer is deleted: `cancelled` by the
/// sender, `dismissed` by the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAction {
    Cancelled,
    Dismissed,
}

impl DeleteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteAction::Cancelled => "cancelled",
            DeleteAction::Dismissed => "dismissed",
        }
    }
}
