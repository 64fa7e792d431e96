use serde_json::{Map, Value};

/// One decoded unit of the agent execution stream.
///
/// The wire-level JSON shapes live in `agentview-protocol`; this is the
/// normalized vocabulary the reducer consumes. Frames must be applied in
/// strict arrival order: scope resolution and result matching depend on
/// prior state.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Incremental assistant text output
    Text(TextPayload),

    /// Tool execution request. A name carrying the sub-agent prefix is a
    /// scope-entry marker, not a leaf invocation.
    ToolCall(ToolCallPayload),

    /// Tool execution result, paired to its call by id
    ToolResult(ToolResultPayload),

    /// Successful end of turn
    Done,

    /// Explicit server-reported failure; terminates the turn
    Fault(FaultPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPayload {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallPayload {
    /// Unique per outstanding call within the turn
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,

    /// Scope the server attributes this call to
    pub agent_name: Option<String>,
    pub is_subagent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultPayload {
    /// Logical parent (tool call) reference id
    pub tool_call_id: String,
    pub name: Option<String>,
    pub agent_name: Option<String>,

    /// Tool output (text, JSON value, error message, etc.)
    pub output: Value,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultPayload {
    pub message: String,
}
