use crate::tool::ToolDescriptor;

const INSTRUCTION_TEMPLATE: &str = include_str!("instruction.md");

/// Tells the model how to reply after a parse error.
pub(crate) fn correction(reason: &str) -> String {
    format!(
        "Invalid Format: {reason}. Reply with 'Thought:', 'Action:' and 'Action Input:' lines to use a tool, or with 'Final Answer:' to answer."
    )
}

pub(crate) fn render_instruction(tools: &[ToolDescriptor]) -> String {
    let tool_lines = tools
        .iter()
        .map(|tool| format!("{}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools
        .iter()
        .map(|tool| tool.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    INSTRUCTION_TEMPLATE
        .trim_end()
        .replace("{{TOOLS}}", &tool_lines)
        .replace("{{TOOL_NAMES}}", &tool_names)
}
