//! 核心层：错误分级、恢复策略、状态机阶段、Agent 构建器

pub mod builder;
pub mod error;
pub mod recovery;
pub mod state;

pub use builder::{create_llm_from_config, AgentBuilder};
pub use error::{AgentError, ErrorClass};
pub use recovery::RecoveryPolicy;
pub use state::AgentPhase;
