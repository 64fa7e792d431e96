use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// NOTE: Schema Design Goals
//
// 1. One schema, two producers: the live stream reducer and the historical
//    replay builder both populate this model, so the rendering layer never
//    branches on where a conversation came from.
// 2. Arrival order is display order: `Message.items` preserves the order
//    frames were applied in; nothing is sorted after the fact.
// 3. Nesting as data: sub-agent delegation forms a tree of AgentCallRecord,
//    not a flat list with depth markers.

// ==========================================
// 1. Message (one side of a turn)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub timestamp: DateTime<Utc>,

    /// Plain text body. Set for user messages; assistant messages carry
    /// their output in `items` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Ordered assistant output. Order within the sequence is arrival
    /// order and is significant for display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<MessageItem>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            timestamp: Utc::now(),
            content: Some(content.into()),
            items: Vec::new(),
        }
    }

    pub fn assistant() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            content: None,
            items: Vec::new(),
        }
    }
}

// ==========================================
// 2. Message items (ordered assistant output)
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageItem {
    /// Merged run of streamed text deltas
    Text { content: String },

    /// Standalone tool invocation (outside any agent scope)
    ToolCall(ToolCallRecord),

    /// Agent scope: groups the tool calls and nested delegations made
    /// while that agent was active
    AgentCall(AgentCallRecord),
}

// ==========================================
// 3. Tool call (pending -> terminal, exactly once)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Success,
    Error,
}

impl ToolStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ToolStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique per outstanding call within a turn
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub status: ToolStatus,

    /// Tool output, set on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure message, set on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub is_subagent: bool,
}

impl ToolCallRecord {
    pub fn pending(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: Map::new(),
            status: ToolStatus::Pending,
            result: None,
            error: None,
            agent_name: None,
            is_subagent: false,
        }
    }
}

// ==========================================
// 4. Agent scope (recursive delegation tree)
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCallRecord {
    pub agent_name: String,
    #[serde(default)]
    pub is_subagent: bool,

    /// Tool calls made while this scope was active, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,

    /// One entry per distinct sub-agent name invoked from this scope;
    /// re-entrant calls update the existing entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_agents: Vec<AgentCallRecord>,

    /// Final text the sub-agent reported back to its caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
}

impl AgentCallRecord {
    pub fn new(agent_name: impl Into<String>, is_subagent: bool) -> Self {
        Self {
            agent_name: agent_name.into(),
            is_subagent,
            tool_calls: Vec::new(),
            nested_agents: Vec::new(),
            text_response: None,
        }
    }
}
