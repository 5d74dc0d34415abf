//! Agent 错误类型与错误分级
//!
//! AgentError 是 `PlanAgent::chat` 对外暴露的错误；ErrorClass 描述错误在编排循环中的处理方式，
//! 由 RecoveryPolicy 给出（见 recovery.rs）。

use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中会终止本次 chat 调用的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 规划结果为空：规划契约被破坏，不重试
    #[error("Plan is empty. Cannot proceed to validation.")]
    EmptyPlan,

    /// 决策后的工具名在注册表中找不到
    #[error("Tool '{0}' not found in available tools.")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Tool registration failed: {0}")]
    Registration(String),
}

/// 错误在编排循环中的处理级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 终止整个 chat 调用（空计划、未知工具、工具内部失败）
    FatalToInvocation,
    /// 单步格式错误：跳过本轮剩余步骤，进入校验
    RecoverableWithinAttempt,
    /// 结构化输出不符合 schema：有限次退避重试
    RecoverableViaRetry,
    /// 记忆加载/保存：记录日志后继续
    Soft,
}
