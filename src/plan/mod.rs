//! 规划层：结构化输出类型、步骤校验、过程记录、事件与 PlanAgent 主循环

pub mod agent;
pub mod events;
pub mod schema;
pub mod transcript;
pub mod validator;

pub use agent::{AgentPrompts, PlanAgent, PlanAgentBuilder};
pub use events::AgentEvent;
pub use schema::{Plan, PlanStep, StepVerdict, ToolDecision, ValidationVerdict};
pub use transcript::{Transcript, MAX_ATTEMPTS_NOTICE};
pub use validator::{ToolValidator, ALLOWED_KEYS, REQUIRED_KEYS};

pub use crate::memory::EntityMap;
