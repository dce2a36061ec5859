use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-chat overview of stored messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    /// Chat identifier
    pub chat_id: i64,
    /// Number of stored messages, including summaries
    pub message_count: usize,
    /// Number of synthesized summary messages
    pub summary_count: usize,
    /// Oldest message timestamp
    pub first_timestamp: DateTime<Utc>,
    /// Newest message timestamp
    pub last_timestamp: DateTime<Utc>,
}
