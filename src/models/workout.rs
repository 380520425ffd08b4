use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub sets: String,
    pub reps: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutDay {
    #[serde(default)]
    pub id: String,
    pub day_title: String,
    pub exercises: Vec<Exercise>,
}

// The JSON document stored in the plan's content column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanContent {
    pub days: Vec<WorkoutDay>,
}

// Workout plan row as stored in the workout_plans table; the content is a
// serialized `PlanContent` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPlanRecord {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl WorkoutPlanRecord {
    pub fn parse_content(&self) -> Result<PlanContent, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub plan_title: String,
    #[serde(default)]
    pub days: Vec<WorkoutDay>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutPlanView {
    pub title: String,
    pub content: PlanContent,
}
