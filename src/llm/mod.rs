//! LLM 层：客户端抽象、结构化输出、有界重试与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod retry;
pub mod structured;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use retry::{with_retry, RetryConfig};
pub use structured::{
    extract_json, generate_structured, parse_json_output, OutputSchema, StructuredOutput,
};
pub use traits::{LlmClient, LlmError, TokenStream};
