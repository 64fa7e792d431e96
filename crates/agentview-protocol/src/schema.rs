use serde::Deserialize;
use serde_json::Value;

/// Raw wire shape of one frame payload.
///
/// The `done` and `error` terminators carry no `type` tag, so the envelope
/// is untagged and tries the tagged event shape first.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub(crate) enum WireRecord {
    Typed(TypedRecord),
    Done(DoneRecord),
    Fault(FaultRecord),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum TypedRecord {
    Text(TextRecord),
    ToolCall(ToolCallRecord),
    ToolResult(ToolResultRecord),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct TextRecord {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ToolCallRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Tolerated as any JSON shape; the mapper coerces to an object
    #[serde(default)]
    pub tool_call_args: Value,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub is_subagent: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ToolResultRecord {
    pub tool_call_id: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tool_status: WireStatus,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum WireStatus {
    #[default]
    Success,
    Error,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct DoneRecord {
    pub done: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct FaultRecord {
    pub error: String,
}
