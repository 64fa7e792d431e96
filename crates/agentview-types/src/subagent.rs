/// Tool-name prefix that marks a call as delegation to another agent.
///
/// This naming convention is the sole scope-entry discriminator on the
/// wire; the `is_subagent` flag on frames is display metadata only.
pub const SUBAGENT_TOOL_PREFIX: &str = "subagent_";

pub fn is_subagent_tool(tool_name: &str) -> bool {
    subagent_target(tool_name).is_some()
}

/// Agent name encoded in a sub-agent tool name, e.g. `subagent_planner`
/// -> `planner`. Returns None for ordinary tool names and for a bare
/// prefix with no target.
pub fn subagent_target(tool_name: &str) -> Option<&str> {
    match tool_name.strip_prefix(SUBAGENT_TOOL_PREFIX) {
        Some(target) if !target.is_empty() => Some(target),
        _ => None,
    }
}
