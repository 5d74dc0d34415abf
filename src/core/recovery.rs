//! 错误恢复策略
//!
//! 把 AgentError / LlmError 映射到 ErrorClass：tool-decision 的重试只对 RecoverableViaRetry 生效，
//! 其余生成调用失败一律向上传播。

use crate::core::{AgentError, ErrorClass};
use crate::llm::LlmError;

/// 语义化错误分级
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryPolicy;

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, err: &AgentError) -> ErrorClass {
        match err {
            AgentError::Llm(e) => self.classify_llm(e),
            AgentError::EmptyPlan
            | AgentError::UnknownTool(_)
            | AgentError::ToolExecutionFailed(_)
            | AgentError::ToolTimeout(_)
            | AgentError::Config(_)
            | AgentError::Registration(_) => ErrorClass::FatalToInvocation,
        }
    }

    /// 只有模型的结构化输出与 schema 不符时才值得重试
    pub fn classify_llm(&self, err: &LlmError) -> ErrorClass {
        match err {
            LlmError::SchemaValidation { .. } => ErrorClass::RecoverableViaRetry,
            _ => ErrorClass::FatalToInvocation,
        }
    }

    pub fn is_retryable(&self, err: &LlmError) -> bool {
        self.classify_llm(err) == ErrorClass::RecoverableViaRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_is_retryable() {
        let policy = RecoveryPolicy::new();
        let err = LlmError::SchemaValidation {
            schema: "tool_decision".to_string(),
            detail: "missing field `tool_input`".to_string(),
        };
        assert!(policy.is_retryable(&err));
        assert_eq!(
            policy.classify(&AgentError::Llm(err)),
            ErrorClass::RecoverableViaRetry
        );
    }

    #[test]
    fn test_request_failure_is_fatal() {
        let policy = RecoveryPolicy::new();
        let err = LlmError::Request("connection reset".to_string());
        assert!(!policy.is_retryable(&err));
    }

    #[test]
    fn test_empty_plan_and_unknown_tool_are_fatal() {
        let policy = RecoveryPolicy::new();
        assert_eq!(
            policy.classify(&AgentError::EmptyPlan),
            ErrorClass::FatalToInvocation
        );
        assert_eq!(
            policy.classify(&AgentError::UnknownTool("x".into())),
            ErrorClass::FatalToInvocation
        );
    }
}
