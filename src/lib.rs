//! Plan Agent - Rust 规划型对话智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分级、恢复策略、状态机阶段、Agent 构建器
//! - **llm**: LLM 客户端抽象、结构化输出、有界重试与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 对话记忆（预算摘要）、实体记忆、持久化
//! - **plan**: ToolValidator、过程记录与 PlanAgent 主循环
//! - **prompt**: 各生成调用的 system 提示词
//! - **tools**: 工具注册表、特殊工具、描述存储、执行器与内置工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod plan;
pub mod prompt;
pub mod tools;

pub use crate::core::{AgentBuilder, AgentError};
pub use crate::plan::{AgentEvent, PlanAgent};
