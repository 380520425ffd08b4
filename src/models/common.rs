use serde::Serialize;

// Structured handler result: success flag, user-facing message, and the
// views a caller should refresh after a mutation.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refresh: Vec<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>, refresh: &[&str]) -> Self {
        Self {
            success: true,
            message: message.into(),
            refresh: refresh.iter().map(|path| path.to_string()).collect(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            refresh: Vec::new(),
        }
    }

    // Success-shaped response with nothing to report, used where the
    // flow completed without a user-facing signal.
    pub fn silent() -> Self {
        Self {
            success: true,
            message: String::new(),
            refresh: Vec::new(),
        }
    }
}
