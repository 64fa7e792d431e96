use agentview_types::{
    subagent_target, AgentCallRecord, Message, MessageItem, StreamFrame, ToolCallPayload,
    ToolCallRecord, ToolResultPayload, ToolStatus,
};
use tracing::{debug, warn};

use crate::scope;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Server sent the done frame
    Completed,
    /// Server sent an error frame, or the transport failed
    Failed,
    /// Caller stopped reading before a terminal frame arrived
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Finished(TurnOutcome),
}

/// State machine that folds one frame at a time into an in-progress
/// assistant message.
///
/// The context stack tracks which agent scope is active as sub-agent
/// calls nest and unwind: scope-entry pushes, the matching sub-agent
/// result pops. Entries are agent names; since nested names are unique
/// per level, the chain from the root addresses exactly one scope.
///
/// Ordinary tool results deliberately do not trust the stack — they are
/// matched by id against the whole tree, because the server may
/// interleave a child's completion after a sibling scope has already
/// advanced.
pub struct TurnReducer {
    agent_name: String,
    message: Message,
    context: Vec<String>,
    phase: Phase,
}

impl TurnReducer {
    /// `agent_name` names the serving agent; it becomes the root scope
    /// for tool calls that do not declare one.
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: Message::assistant(),
            context: Vec::new(),
            phase: Phase::Streaming,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    pub fn outcome(&self) -> Option<TurnOutcome> {
        match self.phase {
            Phase::Finished(outcome) => Some(outcome),
            Phase::Streaming => None,
        }
    }

    /// Current nesting depth of open sub-agent scopes.
    pub fn scope_depth(&self) -> usize {
        self.context.len()
    }

    /// Clone of the message as reconstructed so far. Each clone is an
    /// atomic snapshot; consumers never observe a half-applied frame.
    pub fn snapshot(&self) -> Message {
        self.message.clone()
    }

    /// Consume the message. A reducer that never saw a terminal frame
    /// reports the turn as cancelled.
    pub fn finish(self) -> (Message, TurnOutcome) {
        match self.phase {
            Phase::Finished(outcome) => (self.message, outcome),
            Phase::Streaming => (self.message, TurnOutcome::Cancelled),
        }
    }

    /// Apply one frame. Frames must arrive in stream order; after a
    /// terminal frame the reducer accepts no further mutation.
    pub fn apply(&mut self, frame: StreamFrame) {
        if self.is_finished() {
            debug!("dropping frame received after turn completion");
            return;
        }

        match frame {
            StreamFrame::Text(text) => self.apply_text(&text.content),

            StreamFrame::ToolCall(call) => match subagent_target(&call.name) {
                Some(target) => {
                    let target = target.to_string();
                    self.enter_subagent_scope(&call, &target);
                }
                None => self.apply_tool_call(call),
            },

            StreamFrame::ToolResult(result) => {
                match result.name.as_deref().and_then(subagent_target) {
                    Some(target) => {
                        let target = target.to_string();
                        self.exit_subagent_scope(&result, &target);
                    }
                    None => self.apply_tool_result(&result),
                }
            }

            StreamFrame::Done => self.phase = Phase::Finished(TurnOutcome::Completed),

            StreamFrame::Fault(fault) => {
                self.message.items.push(MessageItem::Text {
                    content: format!("Error: {}", fault.message),
                });
                self.phase = Phase::Finished(TurnOutcome::Failed);
            }
        }
    }

    /// Rule: text output signals the end of the tool-using phase for
    /// every open scope, so the stack unwinds before the delta lands.
    fn apply_text(&mut self, delta: &str) {
        self.context.clear();

        if let Some(MessageItem::Text { content }) = self.message.items.last_mut() {
            content.push_str(delta);
        } else {
            self.message.items.push(MessageItem::Text {
                content: delta.to_string(),
            });
        }
    }

    /// Scope entry. The frame is a marker, not a leaf invocation: no
    /// ToolCallRecord is created for it.
    fn enter_subagent_scope(&mut self, call: &ToolCallPayload, target: &str) {
        let name = call
            .agent_name
            .clone()
            .unwrap_or_else(|| target.to_string());

        if self.context.is_empty() {
            scope::ensure_root_scope(&mut self.message, &name, true);
        } else {
            match scope::resolve_scope_path(&self.message, &self.context) {
                Some(path) => {
                    let parent = scope::scope_at_mut(&mut self.message, &path);
                    scope::ensure_nested_scope(parent, &name);
                }
                None => {
                    warn!(
                        scope = ?self.context,
                        "context stack no longer resolves; opening scope at message root"
                    );
                    self.context.clear();
                    scope::ensure_root_scope(&mut self.message, &name, true);
                }
            }
        }

        self.context.push(name);
    }

    /// Scope exit: the sub-agent's final text lands on the active scope,
    /// then the parent scope becomes active again. A result whose agent
    /// does not match the open scope is a protocol inconsistency and is
    /// dropped.
    fn exit_subagent_scope(&mut self, result: &ToolResultPayload, target: &str) {
        let name = result.agent_name.as_deref().unwrap_or(target);

        let Some(top) = self.context.last() else {
            warn!(agent = name, "sub-agent result with no open scope; dropping");
            return;
        };
        if top.as_str() != name {
            warn!(
                expected = %top,
                got = name,
                "sub-agent result does not match active scope; dropping"
            );
            return;
        }

        if let Some(path) = scope::resolve_scope_path(&self.message, &self.context) {
            let record = scope::scope_at_mut(&mut self.message, &path);
            record.text_response = Some(scope::output_text(&result.output));
        } else {
            warn!(scope = ?self.context, "active scope vanished before its result");
        }

        self.context.pop();
    }

    fn apply_tool_call(&mut self, call: ToolCallPayload) {
        if scope::has_pending_call(&self.message, &call.id) {
            warn!(id = %call.id, "duplicate pending tool call id; dropping frame");
            return;
        }

        let record = ToolCallRecord {
            id: call.id,
            name: call.name,
            arguments: call.arguments,
            status: ToolStatus::Pending,
            result: None,
            error: None,
            agent_name: call.agent_name.clone(),
            is_subagent: call.is_subagent,
        };

        let scope_record =
            self.active_scope_or_root(call.agent_name.as_deref(), call.is_subagent);
        scope_record.tool_calls.push(record);
    }

    fn apply_tool_result(&mut self, result: &ToolResultPayload) {
        let settled = scope::settle_tool_call(
            &mut self.message,
            &result.tool_call_id,
            result.is_error,
            &result.output,
        );
        if !settled {
            warn!(
                id = %result.tool_call_id,
                "tool result does not match any pending call; dropping"
            );
        }
    }

    /// Active scope (top of stack), or the root scope named by the frame
    /// (falling back to the serving agent). A stack that no longer
    /// resolves is discarded rather than trusted.
    fn active_scope_or_root(
        &mut self,
        frame_agent: Option<&str>,
        is_subagent: bool,
    ) -> &mut AgentCallRecord {
        let path = match scope::resolve_scope_path(&self.message, &self.context) {
            Some(path) => path,
            None => {
                if !self.context.is_empty() {
                    warn!(
                        scope = ?self.context,
                        "context stack no longer resolves; falling back to message root"
                    );
                    self.context.clear();
                }
                let name = frame_agent.unwrap_or(self.agent_name.as_str()).to_string();
                scope::ensure_root_scope(&mut self.message, &name, is_subagent)
            }
        };

        scope::scope_at_mut(&mut self.message, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentview_types::{FaultPayload, TextPayload};
    use serde_json::{json, Map, Value};

    fn text(content: &str) -> StreamFrame {
        StreamFrame::Text(TextPayload {
            content: content.to_string(),
        })
    }

    fn tool_call(id: &str, name: &str, agent: Option<&str>) -> StreamFrame {
        let mut arguments = Map::new();
        arguments.insert("q".to_string(), json!("x"));
        StreamFrame::ToolCall(ToolCallPayload {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
            agent_name: agent.map(str::to_string),
            is_subagent: false,
        })
    }

    fn scope_entry(name: &str, agent: Option<&str>) -> StreamFrame {
        StreamFrame::ToolCall(ToolCallPayload {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments: Map::new(),
            agent_name: agent.map(str::to_string),
            is_subagent: true,
        })
    }

    fn tool_result(id: &str, name: &str, agent: Option<&str>, output: Value) -> StreamFrame {
        StreamFrame::ToolResult(ToolResultPayload {
            tool_call_id: id.to_string(),
            name: Some(name.to_string()),
            agent_name: agent.map(str::to_string),
            output,
            is_error: false,
        })
    }

    fn error_result(id: &str, name: &str, output: Value) -> StreamFrame {
        StreamFrame::ToolResult(ToolResultPayload {
            tool_call_id: id.to_string(),
            name: Some(name.to_string()),
            agent_name: None,
            output,
            is_error: true,
        })
    }

    fn root_agent<'a>(message: &'a Message, name: &str) -> &'a AgentCallRecord {
        message
            .items
            .iter()
            .find_map(|item| match item {
                MessageItem::AgentCall(record) if record.agent_name == name => Some(record),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no root agent scope named {}", name))
    }

    #[test]
    fn test_text_deltas_merge_in_arrival_order() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(text("Hi "));
        reducer.apply(text("there"));
        reducer.apply(StreamFrame::Done);

        let (message, outcome) = reducer.finish();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(message.items.len(), 1);
        match &message.items[0] {
            MessageItem::Text { content } => assert_eq!(content, "Hi there"),
            other => panic!("Expected text item, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_call_result_pairing() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_call("1", "search", Some("A")));
        reducer.apply(tool_result("1", "search", Some("A"), json!("42")));

        let message = reducer.snapshot();
        let agent = root_agent(&message, "A");
        assert_eq!(agent.tool_calls.len(), 1);

        let call = &agent.tool_calls[0];
        assert_eq!(call.id, "1");
        assert_eq!(call.status, ToolStatus::Success);
        assert_eq!(call.result, Some(json!("42")));
        assert!(call.error.is_none());
    }

    #[test]
    fn test_tool_error_result() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_call("1", "search", None));
        reducer.apply(error_result("1", "search", json!("index unavailable")));

        let message = reducer.snapshot();
        let call = &root_agent(&message, "main").tool_calls[0];
        assert_eq!(call.status, ToolStatus::Error);
        assert_eq!(call.error.as_deref(), Some("index unavailable"));
        assert!(call.result.is_none());
    }

    #[test]
    fn test_terminal_status_is_never_overwritten() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_call("1", "search", None));
        reducer.apply(tool_result("1", "search", None, json!("first")));
        reducer.apply(error_result("1", "search", json!("late duplicate")));

        let message = reducer.snapshot();
        let call = &root_agent(&message, "main").tool_calls[0];
        assert_eq!(call.status, ToolStatus::Success);
        assert_eq!(call.result, Some(json!("first")));
        assert!(call.error.is_none());
    }

    #[test]
    fn test_unmatched_result_is_dropped() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_result("ghost", "search", None, json!("x")));

        let message = reducer.snapshot();
        assert!(message.items.is_empty());
    }

    #[test]
    fn test_scope_nesting_round_trip() {
        let mut reducer = TurnReducer::new("main");
        assert_eq!(reducer.scope_depth(), 0);

        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        reducer.apply(scope_entry("subagent_critic", Some("critic")));
        assert_eq!(reducer.scope_depth(), 2);

        reducer.apply(tool_result(
            "call_subagent_critic",
            "subagent_critic",
            Some("critic"),
            json!("looks fine"),
        ));
        reducer.apply(tool_result(
            "call_subagent_planner",
            "subagent_planner",
            Some("planner"),
            json!("plan ready"),
        ));
        assert_eq!(reducer.scope_depth(), 0);

        let message = reducer.snapshot();
        let planner = root_agent(&message, "planner");
        assert_eq!(planner.text_response.as_deref(), Some("plan ready"));
        assert_eq!(planner.nested_agents.len(), 1);
        assert_eq!(planner.nested_agents[0].agent_name, "critic");
        assert_eq!(
            planner.nested_agents[0].text_response.as_deref(),
            Some("looks fine")
        );
    }

    #[test]
    fn test_scope_creation_is_idempotent() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        reducer.apply(tool_result(
            "call_subagent_planner",
            "subagent_planner",
            Some("planner"),
            json!("first"),
        ));
        reducer.apply(scope_entry("subagent_planner", Some("planner")));

        let message = reducer.snapshot();
        let scopes = message
            .items
            .iter()
            .filter(|item| matches!(item, MessageItem::AgentCall(record) if record.agent_name == "planner"))
            .count();
        assert_eq!(scopes, 1);
    }

    #[test]
    fn test_planner_scenario() {
        // Scope entry, an ordinary call inside it, the matching sub-agent
        // result, then trailing top-level text.
        let mut reducer = TurnReducer::new("main");
        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        reducer.apply(tool_call("2", "search", Some("planner")));
        reducer.apply(tool_result("2", "search", Some("planner"), json!("found")));
        reducer.apply(tool_result(
            "call_subagent_planner",
            "subagent_planner",
            Some("planner"),
            json!("plan ready"),
        ));
        reducer.apply(text("All done"));
        reducer.apply(StreamFrame::Done);

        assert_eq!(reducer.scope_depth(), 0);
        let (message, _) = reducer.finish();

        assert_eq!(message.items.len(), 2);
        let planner = root_agent(&message, "planner");
        assert!(planner.nested_agents.is_empty());
        assert_eq!(planner.tool_calls.len(), 1);
        assert_eq!(planner.tool_calls[0].status, ToolStatus::Success);
        assert_eq!(planner.text_response.as_deref(), Some("plan ready"));
        match &message.items[1] {
            MessageItem::Text { content } => assert_eq!(content, "All done"),
            other => panic!("Expected trailing text item, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_subagent_result_is_dropped() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        reducer.apply(tool_result(
            "call_subagent_critic",
            "subagent_critic",
            Some("critic"),
            json!("stray"),
        ));

        // The mismatched result neither lands nor pops the scope
        assert_eq!(reducer.scope_depth(), 1);
        let message = reducer.snapshot();
        assert!(root_agent(&message, "planner").text_response.is_none());
    }

    #[test]
    fn test_interleaved_sibling_result_found_by_id_search() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_call("1", "slow_job", Some("A")));
        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        reducer.apply(tool_call("2", "search", Some("planner")));

        // The earlier call completes while the planner scope is active
        reducer.apply(tool_result("1", "slow_job", Some("A"), json!("late")));

        let message = reducer.snapshot();
        let call = &root_agent(&message, "A").tool_calls[0];
        assert_eq!(call.status, ToolStatus::Success);
        assert_eq!(reducer.scope_depth(), 1);
    }

    #[test]
    fn test_text_clears_open_scopes() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(scope_entry("subagent_planner", Some("planner")));
        assert_eq!(reducer.scope_depth(), 1);

        reducer.apply(text("moving on"));
        assert_eq!(reducer.scope_depth(), 0);

        // The next ordinary call lands at the root, not inside planner
        reducer.apply(tool_call("9", "search", Some("A")));
        let message = reducer.snapshot();
        assert!(root_agent(&message, "planner").tool_calls.is_empty());
        assert_eq!(root_agent(&message, "A").tool_calls.len(), 1);
    }

    #[test]
    fn test_fault_appends_error_text_and_finishes() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(text("partial"));
        reducer.apply(StreamFrame::Fault(FaultPayload {
            message: "model overloaded".to_string(),
        }));

        assert_eq!(reducer.outcome(), Some(TurnOutcome::Failed));
        let (message, outcome) = reducer.finish();
        assert_eq!(outcome, TurnOutcome::Failed);
        match message.items.last() {
            Some(MessageItem::Text { content }) => {
                assert_eq!(content, "Error: model overloaded")
            }
            other => panic!("Expected error text item, got {:?}", other),
        }
    }

    #[test]
    fn test_frames_after_done_are_dropped() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(text("hello"));
        reducer.apply(StreamFrame::Done);
        reducer.apply(text(" ignored"));
        reducer.apply(tool_call("1", "search", None));

        let (message, outcome) = reducer.finish();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(message.items.len(), 1);
        match &message.items[0] {
            MessageItem::Text { content } => assert_eq!(content, "hello"),
            other => panic!("Expected text item, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_turn_keeps_partial_state() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(text("thinking"));
        reducer.apply(tool_call("1", "search", None));

        let (message, outcome) = reducer.finish();
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(message.items.len(), 2);

        let call = &root_agent(&message, "main").tool_calls[0];
        assert_eq!(call.status, ToolStatus::Pending);
    }

    #[test]
    fn test_duplicate_pending_call_id_is_dropped() {
        let mut reducer = TurnReducer::new("main");
        reducer.apply(tool_call("1", "search", None));
        reducer.apply(tool_call("1", "search", None));

        let message = reducer.snapshot();
        assert_eq!(root_agent(&message, "main").tool_calls.len(), 1);
    }
}
