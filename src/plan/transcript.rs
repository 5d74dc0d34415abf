//! 单次 chat 调用内的过程记录
//!
//! 按顺序累积可读文本行，作为规划 / 决策 / 校验 / 回复调用的输入，
//! 调用结束时整体写入对话记忆。

use serde::Serialize;

pub const MAX_ATTEMPTS_NOTICE: &str =
    "Maximum number of attempts exceeded. Further plan resets and tool usage are not possible.";

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.lines.pop()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn join(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub fn input_line(user_input: &str) -> String {
    format!("Input: {user_input}")
}

pub fn attempt_line(n: usize) -> String {
    format!("\nAttempt {n}")
}

pub fn plan_line<T: Serialize>(plan: &T) -> String {
    format!("Plan: {}", to_json(plan))
}

pub fn step_error_line(step: usize, message: &str) -> String {
    format!("Step {step} Error : {message}")
}

pub fn step_output_line(step: usize, output: &str) -> String {
    format!("Step {step} Output: {output}")
}

/// 决策调用前的占位行，调用结束后弹出
pub fn current_step_line<T: Serialize>(step: &T, entity_memory: &str) -> String {
    format!(
        "Current Step: {} TODO!\nCurrent Entity Memory:\n<ENTITY MEMORY START>\n{entity_memory}\n<ENTITY MEMORY END>",
        to_json(step)
    )
}

pub fn decision_line<T: Serialize>(step: usize, decision: &T) -> String {
    format!("Plan Step {step} Tool: {}", to_json(decision))
}

pub fn tool_output_line(step: usize, output: &str) -> String {
    format!("Plan Step {step} Tool Output:\n<OUTPUT START>\n{output}\n<OUTPUT END>")
}

pub fn accepted_line(message: &str) -> String {
    format!("Accepted: True\nValidation Message: {message}")
}

pub fn rejected_line(message: &str) -> String {
    format!(
        "Accepted: False\nValidation Message: {message}\n\
         The above process did not pass validation. You need to re-plan based on the validation result."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_pop_join() {
        let mut t = Transcript::new();
        t.push(input_line("hi"));
        t.push(attempt_line(1));
        t.push("temp");
        assert_eq!(t.pop().as_deref(), Some("temp"));
        assert_eq!(t.join(), "Input: hi\n\nAttempt 1");
    }

    #[test]
    fn test_current_step_embeds_entity_memory() {
        let line = current_step_line(&json!({"tool": "echo"}), "{\"none\":null}");
        assert!(line.starts_with("Current Step: {\"tool\":\"echo\"} TODO!"));
        assert!(line.contains("<ENTITY MEMORY START>\n{\"none\":null}\n<ENTITY MEMORY END>"));
    }

    #[test]
    fn test_rejected_line_asks_for_replan() {
        let line = rejected_line("no output");
        assert!(line.starts_with("Accepted: False\nValidation Message: no output\n"));
        assert!(line.ends_with("re-plan based on the validation result."));
    }
}
