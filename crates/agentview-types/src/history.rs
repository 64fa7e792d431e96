use serde::{Deserialize, Serialize};

/// Terminal status recorded for a stored tool record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    User,
    Assistant,
    Tool,
}

/// One stored turn record, as returned by the history store.
///
/// This is the flat shape persisted conversations come back in: call/result
/// pairing and scope nesting are already lost, only the role, text content
/// and (for tool records) name and terminal status survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub role: HistoryRole,

    #[serde(default)]
    pub content: String,

    /// Tool name, present on tool records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}
