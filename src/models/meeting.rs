use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a meeting request. Created as `Pending` by a client,
/// transitioned exactly once to `Confirmed` or `Cancelled` by an
/// administrator; `Completed` marks past confirmed meetings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeetingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeetingStatus::Pending => "PENDING",
            MeetingStatus::Confirmed => "CONFIRMED",
            MeetingStatus::Cancelled => "CANCELLED",
            MeetingStatus::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

// Meeting row as stored in the meetings table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub client_id: String,
    pub requested_time: DateTime<Utc>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

// Filter for list queries against the meetings table
#[derive(Debug, Default)]
pub struct MeetingFilter {
    pub status: Option<MeetingStatus>,
    pub client_id: Option<String>,
}

// Client-submitted meeting request body
#[derive(Debug, Deserialize)]
pub struct MeetingRequest {
    pub requested_time: Option<String>,
}

// Approve/deny request body; an empty id makes the operation a no-op
#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingDecision {
    #[serde(default)]
    pub meeting_id: String,
}

// Meeting as presented to callers; the client name is only populated for
// the administrator's listing
#[derive(Debug, Serialize)]
pub struct MeetingView {
    pub id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub requested_time: DateTime<Utc>,
    pub status: MeetingStatus,
}

impl MeetingView {
    pub fn from_record(record: MeetingRecord, client_name: Option<String>) -> Self {
        Self {
            id: record.id,
            client_id: record.client_id,
            client_name,
            requested_time: record.requested_time,
            status: record.status,
        }
    }
}
