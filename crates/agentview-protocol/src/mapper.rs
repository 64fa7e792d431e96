use agentview_types::{
    FaultPayload, StreamFrame, TextPayload, ToolCallPayload, ToolResultPayload,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::{TypedRecord, WireRecord, WireStatus};

/// Map a raw wire record to a normalized frame.
///
/// Records that are well-formed JSON but not a known frame shape
/// (unknown `type` tags, `done: false`) come back as `Unrecognized`.
pub(crate) fn map_record(record: WireRecord) -> Result<StreamFrame> {
    match record {
        WireRecord::Typed(TypedRecord::Text(text)) => Ok(StreamFrame::Text(TextPayload {
            content: text.content,
        })),

        WireRecord::Typed(TypedRecord::ToolCall(call)) => {
            Ok(StreamFrame::ToolCall(ToolCallPayload {
                arguments: coerce_arguments(&call.tool_name, call.tool_call_args),
                id: call.tool_call_id,
                name: call.tool_name,
                agent_name: call.agent_name,
                is_subagent: call.is_subagent,
            }))
        }

        WireRecord::Typed(TypedRecord::ToolResult(result)) => {
            Ok(StreamFrame::ToolResult(ToolResultPayload {
                tool_call_id: result.tool_call_id,
                name: result.tool_name,
                agent_name: result.agent_name,
                output: result.content,
                is_error: result.tool_status == WireStatus::Error,
            }))
        }

        WireRecord::Typed(TypedRecord::Unknown) => {
            Err(Error::Unrecognized("unknown event type".to_string()))
        }

        WireRecord::Done(done) => {
            if done.done {
                Ok(StreamFrame::Done)
            } else {
                Err(Error::Unrecognized("done frame with done=false".to_string()))
            }
        }

        WireRecord::Fault(fault) => Ok(StreamFrame::Fault(FaultPayload {
            message: fault.error,
        })),
    }
}

/// Arguments arrive as a JSON object in the common case, but the upstream
/// runner forwards whatever the model produced. Non-object shapes degrade
/// to empty arguments; a JSON-encoded object string is unwrapped.
fn coerce_arguments(tool_name: &str, args: Value) -> Map<String, Value> {
    match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(tool_name, "discarding non-object tool arguments");
                Map::new()
            }
        },
        _ => {
            warn!(tool_name, "discarding non-object tool arguments");
            Map::new()
        }
    }
}
