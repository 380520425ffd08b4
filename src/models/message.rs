use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Message row as stored in the messages table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// A client's messages always go to the admin; an administrator must name
// the receiving client
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageThreadParams {
    pub client_id: Option<String>,
}
