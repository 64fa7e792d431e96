use agentview_types::{
    subagent_target, AgentCallRecord, HistoryRecord, HistoryRole, Message, MessageItem,
    RecordStatus, ToolCallRecord, ToolStatus,
};
use serde_json::{Map, Value};
use tracing::warn;

/// Rebuild a conversation from stored turn records.
///
/// Historical records carry no call-stack information, so the tree the
/// live reducer saw cannot be recovered exactly. All tool invocations of
/// an assistant turn are attributed to a single root scope named after
/// the serving agent; records recognizable as sub-agent results become
/// completed single-level `nested_agents` entries. The result uses the
/// same item schema the live path produces, so one renderer serves both.
pub fn replay_history(records: &[HistoryRecord], agent_name: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<ReplayTurnBuilder> = None;

    for record in records {
        match record.role {
            HistoryRole::User => {
                if let Some(builder) = current.take() {
                    if let Some(message) = builder.build() {
                        messages.push(message);
                    }
                }
                messages.push(Message::user(record.content.clone()));
                current = Some(ReplayTurnBuilder::new(agent_name));
            }

            HistoryRole::Assistant => {
                current
                    .get_or_insert_with(|| ReplayTurnBuilder::new(agent_name))
                    .add_text(&record.content);
            }

            HistoryRole::Tool => {
                current
                    .get_or_insert_with(|| ReplayTurnBuilder::new(agent_name))
                    .add_tool_record(record);
            }
        }
    }

    if let Some(builder) = current {
        if let Some(message) = builder.build() {
            messages.push(message);
        }
    }

    messages
}

struct ReplayTurnBuilder {
    root: AgentCallRecord,
    text: String,
}

impl ReplayTurnBuilder {
    fn new(agent_name: &str) -> Self {
        Self {
            root: AgentCallRecord::new(agent_name, false),
            text: String::new(),
        }
    }

    fn add_text(&mut self, content: &str) {
        self.text.push_str(strip_stored_quotes(content));
    }

    fn add_tool_record(&mut self, record: &HistoryRecord) {
        let Some(name) = record.name.as_deref() else {
            warn!("stored tool record without a name; skipping");
            return;
        };

        match subagent_target(name) {
            Some(target) => {
                let response = strip_stored_quotes(&record.content).to_string();
                match self
                    .root
                    .nested_agents
                    .iter_mut()
                    .find(|agent| agent.agent_name == target)
                {
                    Some(existing) => existing.text_response = Some(response),
                    None => {
                        let mut nested = AgentCallRecord::new(target, true);
                        nested.text_response = Some(response);
                        self.root.nested_agents.push(nested);
                    }
                }
            }

            None => {
                let status = match record.status {
                    Some(RecordStatus::Error) => ToolStatus::Error,
                    _ => ToolStatus::Success,
                };
                let mut call = ToolCallRecord {
                    id: record.tool_call_id.clone().unwrap_or_default(),
                    name: name.to_string(),
                    arguments: Map::new(),
                    status,
                    result: None,
                    error: None,
                    agent_name: Some(self.root.agent_name.clone()),
                    is_subagent: false,
                };
                match status {
                    ToolStatus::Error => call.error = Some(record.content.clone()),
                    _ => call.result = Some(Value::String(record.content.clone())),
                }
                self.root.tool_calls.push(call);
            }
        }
    }

    fn build(self) -> Option<Message> {
        let mut message = Message::assistant();

        if !self.root.tool_calls.is_empty() || !self.root.nested_agents.is_empty() {
            message.items.push(MessageItem::AgentCall(self.root));
        }
        if !self.text.is_empty() {
            message.items.push(MessageItem::Text { content: self.text });
        }

        if message.items.is_empty() {
            return None;
        }
        Some(message)
    }
}

/// The storage layer JSON-encodes some text payloads, leaving one
/// redundant layer of enclosing quotes. Strip it when both ends carry one.
fn strip_stored_quotes(content: &str) -> &str {
    content
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentview_types::Role;

    fn user(content: &str) -> HistoryRecord {
        HistoryRecord {
            role: HistoryRole::User,
            content: content.to_string(),
            name: None,
            status: None,
            tool_call_id: None,
        }
    }

    fn assistant(content: &str) -> HistoryRecord {
        HistoryRecord {
            role: HistoryRole::Assistant,
            content: content.to_string(),
            name: None,
            status: None,
            tool_call_id: None,
        }
    }

    fn tool(name: &str, content: &str, status: RecordStatus, id: &str) -> HistoryRecord {
        HistoryRecord {
            role: HistoryRole::Tool,
            content: content.to_string(),
            name: Some(name.to_string()),
            status: Some(status),
            tool_call_id: Some(id.to_string()),
        }
    }

    #[test]
    fn test_text_only_turn() {
        let records = vec![user("Hi"), assistant("Hello!")];
        let messages = replay_history(&records, "main");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content.as_deref(), Some("Hi"));
        assert_eq!(messages[1].role, Role::Assistant);
        match &messages[1].items[0] {
            MessageItem::Text { content } => assert_eq!(content, "Hello!"),
            other => panic!("Expected text item, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_records_attach_to_root_scope() {
        let records = vec![
            user("Look it up"),
            tool("search", "42", RecordStatus::Success, "call_1"),
            assistant("The answer is 42."),
        ];
        let messages = replay_history(&records, "main");

        assert_eq!(messages.len(), 2);
        let items = &messages[1].items;
        assert_eq!(items.len(), 2);

        match &items[0] {
            MessageItem::AgentCall(root) => {
                assert_eq!(root.agent_name, "main");
                assert_eq!(root.tool_calls.len(), 1);
                assert_eq!(root.tool_calls[0].status, ToolStatus::Success);
                assert_eq!(
                    root.tool_calls[0].result,
                    Some(Value::String("42".to_string()))
                );
            }
            other => panic!("Expected agent call item, got {:?}", other),
        }
        match &items[1] {
            MessageItem::Text { content } => assert_eq!(content, "The answer is 42."),
            other => panic!("Expected trailing text item, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_tool_record() {
        let records = vec![
            user("Run it"),
            tool("bash", "command not found", RecordStatus::Error, "call_1"),
        ];
        let messages = replay_history(&records, "main");

        match &messages[1].items[0] {
            MessageItem::AgentCall(root) => {
                let call = &root.tool_calls[0];
                assert_eq!(call.status, ToolStatus::Error);
                assert_eq!(call.error.as_deref(), Some("command not found"));
                assert!(call.result.is_none());
            }
            other => panic!("Expected agent call item, got {:?}", other),
        }
    }

    #[test]
    fn test_subagent_record_becomes_completed_nested_entry() {
        let records = vec![
            user("Plan this"),
            tool(
                "subagent_planner",
                "\"plan ready\"",
                RecordStatus::Success,
                "call_1",
            ),
            assistant("Done."),
        ];
        let messages = replay_history(&records, "main");

        match &messages[1].items[0] {
            MessageItem::AgentCall(root) => {
                assert!(root.tool_calls.is_empty());
                assert_eq!(root.nested_agents.len(), 1);
                let nested = &root.nested_agents[0];
                assert_eq!(nested.agent_name, "planner");
                assert!(nested.is_subagent);
                assert_eq!(nested.text_response.as_deref(), Some("plan ready"));
            }
            other => panic!("Expected agent call item, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_subagent_records_update_one_entry() {
        let records = vec![
            user("Plan twice"),
            tool("subagent_planner", "first", RecordStatus::Success, "1"),
            tool("subagent_planner", "second", RecordStatus::Success, "2"),
        ];
        let messages = replay_history(&records, "main");

        match &messages[1].items[0] {
            MessageItem::AgentCall(root) => {
                assert_eq!(root.nested_agents.len(), 1);
                assert_eq!(
                    root.nested_agents[0].text_response.as_deref(),
                    Some("second")
                );
            }
            other => panic!("Expected agent call item, got {:?}", other),
        }
    }

    #[test]
    fn test_assistant_fragments_concatenate_with_quote_stripping() {
        let records = vec![
            user("Hi"),
            assistant("\"Hello \""),
            assistant("\"world\""),
        ];
        let messages = replay_history(&records, "main");

        match &messages[1].items[0] {
            MessageItem::Text { content } => assert_eq!(content, "Hello world"),
            other => panic!("Expected text item, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_assistant_turn_is_omitted() {
        let records = vec![user("One"), user("Two")];
        let messages = replay_history(&records, "main");

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn test_quote_stripping_edge_cases() {
        assert_eq!(strip_stored_quotes("\"wrapped\""), "wrapped");
        assert_eq!(strip_stored_quotes("plain"), "plain");
        assert_eq!(strip_stored_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(strip_stored_quotes("\""), "\"");
        assert_eq!(strip_stored_quotes(""), "");
    }
}
