//! 特殊工具：不需要 tool_input 决策的控制面动作
//!
//! - `thought`：step 的 message 本身就是输出
//! - `save_chat_memory`：只置位待持久化标记，真正保存发生在本次 chat 结束时
//! - `clear_chat_memory`：立即清空对话记忆

use serde_json::{json, Map, Value};

use crate::tools::{ToolDescriptor, ToolKind};

pub const SAVE_CONFIRMATION: &str = "Conversation history has been saved successfully.";
pub const CLEAR_CONFIRMATION: &str = "Conversation history has been reset successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTool {
    Thought,
    SaveChatMemory,
    ClearChatMemory,
}

/// 特殊工具对记忆的副作用，由 PlanAgent 执行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEffect {
    RequestSave,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialOutcome {
    pub output: String,
    pub effect: Option<MemoryEffect>,
}

impl SpecialTool {
    pub const ALL: [SpecialTool; 3] = [
        SpecialTool::Thought,
        SpecialTool::SaveChatMemory,
        SpecialTool::ClearChatMemory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialTool::Thought => "thought",
            SpecialTool::SaveChatMemory => "save_chat_memory",
            SpecialTool::ClearChatMemory => "clear_chat_memory",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            SpecialTool::Thought => {
                "This tool is a special tool. Instead of executing the tool directly with tool_input, \
                 the 'message' tool_input functions as your thought process.\n\
                 This tool must be triggered when no other tool is used. It can also be triggered when \
                 additional reasoning is needed to respond to the user's question at the current stage.\n\
                 In this case, your thought should go into 'message', and that will be delivered to the user.\n\n\
                 Args:\n    message (str): Your thought."
            }
            SpecialTool::SaveChatMemory => {
                "This tool is a special tool. Use it when you want to permanently save the conversation \
                 history with the user so far.\n\n\
                 Args:\n    message (str): The user's question or request that triggered this tool \
                 (e.g., 'Save our memory.', 'Let's record our conversation so far.')."
            }
            SpecialTool::ClearChatMemory => {
                "This tool is a special tool. Use it when you want to delete or reset the conversation \
                 history with the user so far.\n\n\
                 Args:\n    message (str): The user's question or request that triggered this tool \
                 (e.g., 'Delete the memory.', 'Reset the conversation history so far.')"
            }
        }
    }

    pub fn args_schema(self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("message".to_string(), json!({"title": "Message", "type": "string"}));
        args
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            kind: ToolKind::Special,
            description: self.description().to_string(),
            args: self.args_schema(),
        }
    }

    /// 计算输出与副作用（副作用由调用方施加到记忆上）
    pub fn invoke(self, message: &str) -> SpecialOutcome {
        match self {
            SpecialTool::Thought => SpecialOutcome {
                output: message.to_string(),
                effect: None,
            },
            SpecialTool::SaveChatMemory => SpecialOutcome {
                output: SAVE_CONFIRMATION.to_string(),
                effect: Some(MemoryEffect::RequestSave),
            },
            SpecialTool::ClearChatMemory => SpecialOutcome {
                output: CLEAR_CONFIRMATION.to_string(),
                effect: Some(MemoryEffect::Clear),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_echoes_message() {
        let out = SpecialTool::Thought.invoke("no tool needed");
        assert_eq!(out.output, "no tool needed");
        assert_eq!(out.effect, None);
    }

    #[test]
    fn test_memory_tools_carry_effects() {
        assert_eq!(
            SpecialTool::SaveChatMemory.invoke("save").effect,
            Some(MemoryEffect::RequestSave)
        );
        let clear = SpecialTool::ClearChatMemory.invoke("reset");
        assert_eq!(clear.output, CLEAR_CONFIRMATION);
        assert_eq!(clear.effect, Some(MemoryEffect::Clear));
    }

    #[test]
    fn test_from_name_round_trips() {
        for tool in SpecialTool::ALL {
            assert_eq!(SpecialTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(SpecialTool::from_name("web_search"), None);
    }
}
