//! 各生成调用的 system 提示词
//!
//! 优先读取 `config/prompts/<name>.txt`（或 `../config/prompts/`），不存在时使用内置默认值。
//! 模板中的 `{COMMON_TOOL_DESC}` / `{SPECIAL_TOOL_DESC}` / `{TOOL_FOR_CURRENT_STEP}` 由 `render` 替换。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Plan,
    Tool,
    Validation,
    Response,
    Summary,
    Entity,
}

impl PromptKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PromptKind::Plan => "plan",
            PromptKind::Tool => "tool",
            PromptKind::Validation => "validation",
            PromptKind::Response => "response",
            PromptKind::Summary => "summary",
            PromptKind::Entity => "entity",
        }
    }

    fn default_template(self) -> &'static str {
        match self {
            PromptKind::Plan => PLAN_PROMPT,
            PromptKind::Tool => TOOL_PROMPT,
            PromptKind::Validation => VALIDATION_PROMPT,
            PromptKind::Response => RESPONSE_PROMPT,
            PromptKind::Summary => SUMMARY_PROMPT,
            PromptKind::Entity => ENTITY_PROMPT,
        }
    }
}

pub fn load(kind: PromptKind) -> String {
    let name = kind.file_name();
    [
        format!("config/prompts/{name}.txt"),
        format!("../config/prompts/{name}.txt"),
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .unwrap_or_else(|| kind.default_template().to_string())
}

/// 替换模板中的 `{KEY}` 占位符
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

const PLAN_PROMPT: &str = "\
You are a planning assistant. Read the conversation and the current working log, then produce \
an ordered plan of tool calls that answers the user's latest input.
Each step is an object with the keys `tool` (the tool name) and `message` (what this step should \
achieve). Add `tool_input` only when you already know the exact arguments. No other keys are allowed.
If no tool is needed, plan a single `thought` step.
If the log contains a failed validation, re-plan based on the validation message.

Common tools:
{COMMON_TOOL_DESC}

Special tools:
{SPECIAL_TOOL_DESC}";

const TOOL_PROMPT: &str = "\
You decide the exact input for the current plan step marked with TODO. Use the working log, the \
conversation and the entity memory to fill every argument of the tool below.

Tool for the current step:
{TOOL_FOR_CURRENT_STEP}";

const VALIDATION_PROMPT: &str = "\
You validate whether the plan in the working log was executed correctly and produced meaningful \
results for the user's input. Set `is_valid` to false when a step failed, was skipped, or its output \
does not help answer the input, and explain why in `message` so a new plan can be made.";

const RESPONSE_PROMPT: &str = "\
You are a helpful assistant. Using the conversation and the working log (plan, tool outputs and \
validation), write a clear and friendly final answer to the user's latest input. Do not mention \
internal steps unless they help the user.

Common tools:
{COMMON_TOOL_DESC}

Special tools:
{SPECIAL_TOOL_DESC}";

const SUMMARY_PROMPT: &str = "\
You compress conversations. Summarize the conversation so far, keeping facts, user preferences, \
decisions and open questions. Be concise.";

const ENTITY_PROMPT: &str = "\
EntityMemoryChain extracts and updates entities from the conversation. Entities include people, \
places, organizations, dates, facts, user goals, decisions, or any information worth remembering. \
The output is a JSON dictionary of entities.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let out = render(
            "{A} and {B} and {A}",
            &[("A", "x"), ("B", "y")],
        );
        assert_eq!(out, "x and y and x");
    }

    #[test]
    fn test_default_plan_prompt_has_tool_sections() {
        let tpl = PromptKind::Plan.default_template();
        assert!(tpl.contains("{COMMON_TOOL_DESC}"));
        assert!(tpl.contains("{SPECIAL_TOOL_DESC}"));
    }
}
