use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message on the per-auction chat feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub user:      String,
    pub message:   String,
    pub timestamp: DateTime<Utc>,
}

/// What the client is allowed to push back on the chat feed.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundChat {
    pub message: String,
}
