use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "tasks.ts")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// Progress record of a background task. Tasks outlive the connection that
/// started them.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "tasks.ts")]
pub struct TaskInfo {
    pub id: String,
    pub kind: String,
    pub description: String,
    pub status: TaskStatus,
    /// 0.0 - 1.0
    pub progress: f32,
    pub message: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}
