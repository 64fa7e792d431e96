use agentview_types::{AgentCallRecord, Message, MessageItem, ToolCallRecord, ToolStatus};
use serde_json::Value;

/// Index path addressing one agent scope inside a message: the root item
/// position, then the `nested_agents` position at each level below it.
///
/// Paths are resolved immutably and navigated mutably in a second pass,
/// so no borrow is held across the resolution logic.
#[derive(Debug, Clone)]
pub(crate) struct ScopePath {
    item: usize,
    nested: Vec<usize>,
}

/// Resolve a chain of agent names to an index path. Names are unique per
/// level, so the chain addresses at most one scope. Returns None for an
/// empty chain or a chain the tree no longer contains.
pub(crate) fn resolve_scope_path(message: &Message, chain: &[String]) -> Option<ScopePath> {
    let (root_name, rest) = chain.split_first()?;

    let item = message.items.iter().position(
        |item| matches!(item, MessageItem::AgentCall(record) if &record.agent_name == root_name),
    )?;

    let mut record = match &message.items[item] {
        MessageItem::AgentCall(record) => record,
        _ => return None,
    };

    let mut nested = Vec::with_capacity(rest.len());
    for name in rest {
        let idx = record
            .nested_agents
            .iter()
            .position(|agent| &agent.agent_name == name)?;
        record = &record.nested_agents[idx];
        nested.push(idx);
    }

    Some(ScopePath { item, nested })
}

pub(crate) fn scope_at_mut<'a>(message: &'a mut Message, path: &ScopePath) -> &'a mut AgentCallRecord {
    let mut record = match &mut message.items[path.item] {
        MessageItem::AgentCall(record) => record,
        _ => unreachable!("scope path addresses a non-agent item"),
    };
    for &idx in &path.nested {
        record = &mut record.nested_agents[idx];
    }
    record
}

/// Root-level scope for `name`, appended as a new item if absent.
pub(crate) fn ensure_root_scope(message: &mut Message, name: &str, is_subagent: bool) -> ScopePath {
    let item = message
        .items
        .iter()
        .position(|item| matches!(item, MessageItem::AgentCall(record) if record.agent_name == name))
        .unwrap_or_else(|| {
            message
                .items
                .push(MessageItem::AgentCall(AgentCallRecord::new(name, is_subagent)));
            message.items.len() - 1
        });

    ScopePath {
        item,
        nested: Vec::new(),
    }
}

/// Nested scope for `name` under `parent`, reused by name (re-entrant
/// calls into the same sub-agent update the existing entry).
pub(crate) fn ensure_nested_scope<'a>(
    parent: &'a mut AgentCallRecord,
    name: &str,
) -> &'a mut AgentCallRecord {
    let idx = parent
        .nested_agents
        .iter()
        .position(|agent| agent.agent_name == name)
        .unwrap_or_else(|| {
            parent.nested_agents.push(AgentCallRecord::new(name, true));
            parent.nested_agents.len() - 1
        });

    &mut parent.nested_agents[idx]
}

/// Depth-first search over the whole item tree for the pending call with
/// this id, applying the pending -> terminal transition. Searching the
/// whole tree (rather than the active scope) tolerates results that
/// reference calls from scopes whose activation has since changed.
pub(crate) fn settle_tool_call(
    message: &mut Message,
    id: &str,
    is_error: bool,
    output: &Value,
) -> bool {
    for item in &mut message.items {
        let settled = match item {
            MessageItem::ToolCall(record) => try_settle(record, id, is_error, output),
            MessageItem::AgentCall(agent) => settle_in_agent(agent, id, is_error, output),
            MessageItem::Text { .. } => false,
        };
        if settled {
            return true;
        }
    }
    false
}

fn settle_in_agent(agent: &mut AgentCallRecord, id: &str, is_error: bool, output: &Value) -> bool {
    for record in &mut agent.tool_calls {
        if try_settle(record, id, is_error, output) {
            return true;
        }
    }
    for nested in &mut agent.nested_agents {
        if settle_in_agent(nested, id, is_error, output) {
            return true;
        }
    }
    false
}

fn try_settle(record: &mut ToolCallRecord, id: &str, is_error: bool, output: &Value) -> bool {
    // Terminal records never transition again
    if record.id != id || record.status.is_terminal() {
        return false;
    }

    if is_error {
        record.status = ToolStatus::Error;
        record.error = Some(output_text(output));
    } else {
        record.status = ToolStatus::Success;
        record.result = Some(output.clone());
    }
    true
}

pub(crate) fn has_pending_call(message: &Message, id: &str) -> bool {
    fn in_agent(agent: &AgentCallRecord, id: &str) -> bool {
        agent
            .tool_calls
            .iter()
            .any(|record| record.id == id && record.status == ToolStatus::Pending)
            || agent.nested_agents.iter().any(|nested| in_agent(nested, id))
    }

    message.items.iter().any(|item| match item {
        MessageItem::ToolCall(record) => record.id == id && record.status == ToolStatus::Pending,
        MessageItem::AgentCall(agent) => in_agent(agent, id),
        MessageItem::Text { .. } => false,
    })
}

/// Human-readable form of a tool output value: strings pass through,
/// everything else renders as compact JSON.
pub(crate) fn output_text(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
