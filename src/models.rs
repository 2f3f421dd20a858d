use serde::Serialize;

use crate::session::SessionStatus;

// response for upload start
#[derive(Serialize, Debug)]
pub struct UploadStartResponse {
    pub session_id: String,
    pub file_name: String,
    pub total_chunks: u64,
}

// acknowledgment for pause/resume/cancel
#[derive(Serialize, Debug)]
pub struct TransferActionResponse {
    pub success: bool,
    pub session_id: String,
    pub action: &'static str,
}

// response for the status endpoint
#[derive(Serialize, Debug)]
pub struct StatusResponse {
    pub uploaded_chunks: u64,
    pub total_chunks: u64,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SessionStatus> for StatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            uploaded_chunks: status.uploaded_chunks,
            total_chunks: status.total_chunks,
            paused: status.paused,
            completed: status.completed,
            cancelled: status.cancelled,
            error: status.error,
        }
    }
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
