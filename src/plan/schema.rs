//! 生成调用的结构化输出类型
//!
//! Plan 的步骤保留为原始 JSON 对象，形状由 ToolValidator 逐步检查；
//! 其余类型在反序列化边界处即完成校验。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::StructuredOutput;

/// 规划结果
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Ordered tool calls that answer the user's input
    #[schemars(with = "Vec<PlanStep>")]
    pub plan: Vec<Map<String, Value>>,
}

impl StructuredOutput for Plan {
    const NAME: &'static str = "plan";
}

/// 通过校验后的单个计划步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    /// Name of the tool to use
    pub tool: String,
    /// What this step should achieve
    pub message: String,
    /// Exact tool arguments, only when already known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Map<String, Value>>,
}

impl PlanStep {
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(raw.clone()))
    }
}

/// 某一步完全确定的工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolDecision {
    /// Name of the tool to call
    pub tool: String,
    /// Arguments for the tool
    pub tool_input: Map<String, Value>,
    /// Short note about this call
    #[serde(default)]
    pub message: String,
}

impl StructuredOutput for ToolDecision {
    const NAME: &'static str = "tool_decision";
}

impl ToolDecision {
    /// jump 快速路径：直接使用计划步骤自带的 tool_input
    pub fn from_step(step: &PlanStep) -> Self {
        Self {
            tool: step.tool.clone(),
            tool_input: step.tool_input.clone().unwrap_or_default(),
            message: step.message.clone(),
        }
    }
}

/// 对一次尝试完整过程的判断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationVerdict {
    /// Whether the attempt produced a meaningful result for the input
    pub is_valid: bool,
    /// Reason for the judgement
    #[serde(default)]
    pub message: String,
}

impl StructuredOutput for ValidationVerdict {
    const NAME: &'static str = "validation";
}

/// ToolValidator 对单个步骤的判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    /// 形状不合法，附错误信息
    Invalid(String),
    /// 合法，需要 tool-decision 调用补全输入
    Resolve,
    /// tool_input 与声明的 args 完全相同，直接执行
    Jump,
}

impl StepVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepVerdict::Invalid(_) => "false",
            StepVerdict::Resolve => "true",
            StepVerdict::Jump => "jump",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StepVerdict::Invalid(message) => message,
            _ => "",
        }
    }
}
