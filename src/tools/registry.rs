//! 工具注册表
//!
//! 启动时显式注册：普通工具实现 Tool trait（name / description / args_schema / execute），
//! 特殊工具是固定的三个控制面动作（见 special.rs）。注册表按注册顺序保存，单个工具构造失败时
//! 记录日志并跳过，不影响其他工具。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::tools::SpecialTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Common,
    Special,
}

/// 工具静态元数据；`args` 是 ToolValidator 快速路径比较的权威形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub kind: ToolKind,
    pub description: String,
    pub args: Map<String, Value>,
}

impl ToolDescriptor {
    /// 提示词中的 markdown 片段：- `name` : {args}\ndescription
    pub fn to_prompt(&self) -> String {
        let args = serde_json::to_string(&self.args).unwrap_or_else(|_| "{}".to_string());
        format!("- `{}` : {}\n{}", self.name, args, self.description)
    }
}

/// 参数结构体的 JSON Schema `properties`，作为工具的 args 形状
pub fn args_schema_of<T: JsonSchema>() -> Map<String, Value> {
    serde_json::to_value(schema_for!(T))
        .ok()
        .and_then(|v| v.get("properties").and_then(Value::as_object).cloned())
        .unwrap_or_default()
}

/// 普通工具 trait：名称、描述（供 LLM 理解）、参数形状、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn args_schema(&self) -> Map<String, Value>;

    /// 执行工具；Err 表示工具内部失败
    async fn execute(&self, args: Value) -> Result<String, String>;

    /// 自行管理时限的工具在执行器超时时返回的文本结果；None 表示超时为错误
    fn time_limit_output(&self, _secs: u64) -> Option<String> {
        None
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    special: Vec<SpecialTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册表附带全部三个特殊工具
    pub fn with_special_tools() -> Self {
        let mut registry = Self::new();
        for tool in SpecialTool::ALL {
            // 空注册表上不会重名
            let _ = registry.register_special(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        self.ensure_unique(&name)?;
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    pub fn register_special(&mut self, tool: SpecialTool) -> Result<(), AgentError> {
        self.ensure_unique(tool.name())?;
        self.special.push(tool);
        Ok(())
    }

    /// 构造并注册一个工具；构造或注册失败时记录 warn 并跳过，返回是否成功
    pub fn try_register<T, F>(&mut self, label: &str, build: F) -> bool
    where
        T: Tool + 'static,
        F: FnOnce() -> Result<T, String>,
    {
        let result = build().map_err(AgentError::Registration).and_then(|t| self.register(t));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(tool = label, error = %e, "[tool:skip] registration failed");
                false
            }
        }
    }

    fn ensure_unique(&self, name: &str) -> Result<(), AgentError> {
        if self.index.contains_key(name) || self.special.iter().any(|s| s.name() == name) {
            return Err(AgentError::Registration(format!(
                "tool '{name}' is already registered"
            )));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    /// 按名称匹配特殊工具（仅限已注册的）
    pub fn special(&self, name: &str) -> Option<SpecialTool> {
        self.special.iter().copied().find(|s| s.name() == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.name().to_string())
            .chain(self.special.iter().map(|s| s.name().to_string()))
            .collect()
    }

    pub fn common_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                kind: ToolKind::Common,
                description: tool.description().to_string(),
                args: tool.args_schema(),
            })
            .collect()
    }

    pub fn special_descriptors(&self) -> Vec<ToolDescriptor> {
        self.special.iter().map(|s| s.descriptor()).collect()
    }

    /// 全部描述：普通工具在前，按注册顺序
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut all = self.common_descriptors();
        all.extend(self.special_descriptors());
        all
    }

    /// 单个普通工具的提示词片段（tool-decision 调用用），未知工具返回空串
    pub fn common_tool_prompt(&self, name: &str) -> String {
        self.common_descriptors()
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.to_prompt())
            .unwrap_or_default()
    }
}

/// 多个描述拼成提示词段落
pub fn descriptors_prompt(descriptors: &[ToolDescriptor]) -> String {
    descriptors
        .iter()
        .map(ToolDescriptor::to_prompt)
        .collect::<Vec<_>>()
        .join("\n\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            ""
        }
        fn args_schema(&self) -> Map<String, Value> {
            Map::new()
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_registration_keeps_order_and_kinds() {
        let mut registry = ToolRegistry::with_special_tools();
        registry.register(EchoTool).unwrap();
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].name, "echo");
        assert_eq!(descriptors[0].kind, ToolKind::Common);
        let specials: Vec<_> = descriptors[1..].iter().map(|d| d.name.as_str()).collect();
        assert_eq!(specials, ["thought", "save_chat_memory", "clear_chat_memory"]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::with_special_tools();
        registry.register(EchoTool).unwrap();
        assert!(matches!(
            registry.register(EchoTool),
            Err(AgentError::Registration(_))
        ));
    }

    #[test]
    fn test_failed_build_is_skipped() {
        let mut registry = ToolRegistry::new();
        assert!(!registry.try_register::<Broken, _>("broken", || Err("no backend".into())));
        assert!(registry.try_register("echo", || Ok(EchoTool)));
        assert_eq!(registry.tool_names(), ["echo"]);
    }

    #[test]
    fn test_common_tool_prompt_contains_args() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let prompt = registry.common_tool_prompt("echo");
        assert!(prompt.starts_with("- `echo` : {"));
        assert!(prompt.contains("\"text\""));
        assert_eq!(registry.common_tool_prompt("missing"), "");
    }
}
