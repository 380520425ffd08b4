use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::models::meeting::{MeetingFilter, MeetingRecord, MeetingStatus};
use crate::models::message::MessageRecord;
use crate::models::profile::{ProfileRecord, Role};
use crate::models::workout::{PlanContent, WorkoutPlanRecord};

const MEETINGS_HEADERS: [&str; 6] = [
    "id",
    "client_id",
    "requested_time",
    "status",
    "created_at",
    "decided_at",
];
const PROFILES_HEADERS: [&str; 4] = ["id", "email", "full_name", "role"];
const PLANS_HEADERS: [&str; 5] = ["id", "client_id", "title", "content", "created_at"];
const MESSAGES_HEADERS: [&str; 5] = ["id", "sender_id", "receiver_id", "content", "created_at"];

// Database service storing each table as a CSV file under a data directory
pub struct DatabaseService {
    meetings_path: PathBuf,
    profiles_path: PathBuf,
    plans_path: PathBuf,
    messages_path: PathBuf,
    file_mutex: Mutex<()>,
}

impl DatabaseService {
    pub fn new(data_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            error!("Failed to create data directory: {}", e);
            panic!("Failed to create data directory: {}", e);
        }

        let meetings_path = data_dir.join("meetings.csv");
        let profiles_path = data_dir.join("profiles.csv");
        let plans_path = data_dir.join("workout_plans.csv");
        let messages_path = data_dir.join("messages.csv");

        Self::ensure_table(&meetings_path, &MEETINGS_HEADERS);
        Self::ensure_table(&profiles_path, &PROFILES_HEADERS);
        Self::ensure_table(&plans_path, &PLANS_HEADERS);
        Self::ensure_table(&messages_path, &MESSAGES_HEADERS);

        Self {
            meetings_path,
            profiles_path,
            plans_path,
            messages_path,
            file_mutex: Mutex::new(()),
        }
    }

    // Create the table file with headers if it doesn't exist yet
    fn ensure_table(path: &Path, headers: &[&str]) {
        if path.exists() {
            return;
        }

        info!("Creating table file at {}", path.display());

        let file = File::create(path).unwrap_or_else(|e| {
            error!("Failed to create table file: {}", e);
            panic!("Failed to create table file: {}", e)
        });

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        if let Err(e) = writer.write_record(headers) {
            error!("Failed to write headers: {}", e);
            panic!("Failed to write headers: {}", e);
        }

        if let Err(e) = writer.flush() {
            error!("Failed to flush headers: {}", e);
            panic!("Failed to flush headers: {}", e);
        }
    }

    // Store-assigned opaque record id
    fn generate_id() -> String {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn read_all<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, String> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        if !path.exists() {
            return Ok(Vec::new());
        }

        let file =
            File::open(path).map_err(|e| format!("Failed to open database file: {}", e))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: T = result.map_err(|e| format!("Failed to read record: {}", e))?;
            rows.push(row);
        }

        Ok(rows)
    }

    fn append_row<T: Serialize>(&self, path: &Path, row: &T) -> Result<(), String> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open database file: {}", e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .serialize(row)
            .map_err(|e| format!("Failed to serialize record: {}", e))?;

        writer
            .flush()
            .map_err(|e| format!("Failed to flush writer: {}", e))?;

        Ok(())
    }

    // --- Meetings ---

    /// Insert a new meeting request in the pending state. The id and
    /// creation time are assigned here, never by the caller.
    pub fn insert_meeting(
        &self,
        client_id: &str,
        requested_time: DateTime<Utc>,
    ) -> Result<MeetingRecord, String> {
        let record = MeetingRecord {
            id: Self::generate_id(),
            client_id: client_id.to_string(),
            requested_time,
            status: MeetingStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        };

        self.append_row(&self.meetings_path, &record)?;

        info!(
            "Stored meeting request {} for client {} at {}",
            record.id, record.client_id, record.requested_time
        );

        Ok(record)
    }

    pub fn list_meetings(&self, filter: &MeetingFilter) -> Result<Vec<MeetingRecord>, String> {
        let mut meetings: Vec<MeetingRecord> = self.read_all(&self.meetings_path)?;

        if let Some(status) = filter.status {
            meetings.retain(|meeting| meeting.status == status);
        }
        if let Some(client_id) = &filter.client_id {
            meetings.retain(|meeting| &meeting.client_id == client_id);
        }

        Ok(meetings)
    }

    /// Start times of all confirmed meetings, as consumed by the conflict
    /// checker.
    pub fn list_confirmed_times(&self) -> Result<Vec<DateTime<Utc>>, String> {
        let confirmed = self.list_meetings(&MeetingFilter {
            status: Some(MeetingStatus::Confirmed),
            client_id: None,
        })?;

        Ok(confirmed
            .into_iter()
            .map(|meeting| meeting.requested_time)
            .collect())
    }

    pub fn find_meeting(&self, meeting_id: &str) -> Result<Option<MeetingRecord>, String> {
        Ok(self
            .read_all::<MeetingRecord>(&self.meetings_path)?
            .into_iter()
            .find(|meeting| meeting.id == meeting_id))
    }

    /// Set the status of the meeting with the given id, recording the
    /// decision time. Returns false when no such meeting exists.
    pub fn update_meeting_status(
        &self,
        meeting_id: &str,
        status: MeetingStatus,
    ) -> Result<bool, String> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| format!("Failed to acquire mutex: {}", e))?;

        let file = File::open(&self.meetings_path)
            .map_err(|e| format!("Failed to open database file: {}", e))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut meetings = Vec::new();
        for result in reader.deserialize() {
            let meeting: MeetingRecord =
                result.map_err(|e| format!("Failed to read record: {}", e))?;
            meetings.push(meeting);
        }

        let mut updated = false;
        for meeting in meetings.iter_mut() {
            if meeting.id == meeting_id {
                meeting.status = status;
                meeting.decided_at = Some(Utc::now());
                updated = true;
            }
        }

        if !updated {
            warn!("No meeting found with id {}", meeting_id);
            return Ok(false);
        }

        // Write all records back (overwrite the file)
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.meetings_path)
            .map_err(|e| format!("Failed to open database file for writing: {}", e))?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        for meeting in &meetings {
            writer
                .serialize(meeting)
                .map_err(|e| format!("Failed to write record: {}", e))?;
        }

        writer
            .flush()
            .map_err(|e| format!("Failed to flush writer: {}", e))?;

        info!("Meeting {} marked {}", meeting_id, status);

        Ok(true)
    }

    // --- Profiles ---

    /// Insert a profile. The id comes from the identity provider, which
    /// owns user identities.
    pub fn insert_profile(
        &self,
        id: &str,
        email: &str,
        full_name: &str,
        role: Role,
    ) -> Result<ProfileRecord, String> {
        let record = ProfileRecord {
            id: id.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            role,
        };

        self.append_row(&self.profiles_path, &record)?;

        info!("Stored profile {} ({})", record.id, record.role);

        Ok(record)
    }

    pub fn find_profile(&self, id: &str) -> Result<Option<ProfileRecord>, String> {
        Ok(self
            .read_all::<ProfileRecord>(&self.profiles_path)?
            .into_iter()
            .find(|profile| profile.id == id))
    }

    /// The admin profile clients exchange messages with. The application
    /// assumes a single administrator; the first one wins.
    pub fn find_admin(&self) -> Result<Option<ProfileRecord>, String> {
        Ok(self
            .read_all::<ProfileRecord>(&self.profiles_path)?
            .into_iter()
            .find(|profile| profile.role == Role::Admin))
    }

    pub fn list_clients(&self) -> Result<Vec<ProfileRecord>, String> {
        let mut clients: Vec<ProfileRecord> = self
            .read_all::<ProfileRecord>(&self.profiles_path)?
            .into_iter()
            .filter(|profile| profile.role == Role::Client)
            .collect();

        clients.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        Ok(clients)
    }

    // --- Workout plans ---

    pub fn store_workout_plan(
        &self,
        client_id: &str,
        title: &str,
        content: &PlanContent,
    ) -> Result<WorkoutPlanRecord, String> {
        let record = WorkoutPlanRecord {
            id: Self::generate_id(),
            client_id: client_id.to_string(),
            title: title.to_string(),
            content: serde_json::to_string(content)
                .map_err(|e| format!("Failed to serialize plan content: {}", e))?,
            created_at: Utc::now(),
        };

        self.append_row(&self.plans_path, &record)?;

        info!(
            "Stored workout plan {} for client {}",
            record.id, record.client_id
        );

        Ok(record)
    }

    /// The most recently created plan for a client, if any. A client
    /// without a plan is a normal condition, not an error.
    pub fn latest_plan_for_client(
        &self,
        client_id: &str,
    ) -> Result<Option<WorkoutPlanRecord>, String> {
        let mut plans: Vec<WorkoutPlanRecord> = self
            .read_all::<WorkoutPlanRecord>(&self.plans_path)?
            .into_iter()
            .filter(|plan| plan.client_id == client_id)
            .collect();

        plans.sort_by_key(|plan| plan.created_at);

        Ok(plans.pop())
    }

    pub fn list_workout_plans(&self) -> Result<Vec<WorkoutPlanRecord>, String> {
        self.read_all(&self.plans_path)
    }

    // --- Messages ---

    pub fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<MessageRecord, String> {
        let record = MessageRecord {
            id: Self::generate_id(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.append_row(&self.messages_path, &record)?;

        Ok(record)
    }

    /// All messages exchanged between two parties, oldest first
    pub fn list_thread(&self, party_a: &str, party_b: &str) -> Result<Vec<MessageRecord>, String> {
        let mut messages: Vec<MessageRecord> = self
            .read_all::<MessageRecord>(&self.messages_path)?
            .into_iter()
            .filter(|message| {
                (message.sender_id == party_a && message.receiver_id == party_b)
                    || (message.sender_id == party_b && message.receiver_id == party_a)
            })
            .collect();

        messages.sort_by_key(|message| message.created_at);

        Ok(messages)
    }

    /// All messages a user sent or received, oldest first
    pub fn list_messages_for_user(&self, user_id: &str) -> Result<Vec<MessageRecord>, String> {
        let mut messages: Vec<MessageRecord> = self
            .read_all::<MessageRecord>(&self.messages_path)?
            .into_iter()
            .filter(|message| message.sender_id == user_id || message.receiver_id == user_id)
            .collect();

        messages.sort_by_key(|message| message.created_at);

        Ok(messages)
    }
}

// Create a singleton database service
pub fn create_database_service() -> Arc<DatabaseService> {
    // Default path with environment variable override
    let default_dir = "/app/data";
    let data_dir = std::env::var("GYM_DATA_DIR").unwrap_or_else(|_| default_dir.to_string());

    Arc::new(DatabaseService::new(Path::new(&data_dir)))
}
