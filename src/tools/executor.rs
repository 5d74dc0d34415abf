//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用对应普通工具，
//! 未知工具、超时或失败时转为 AgentError（UnknownTool / ToolTimeout / ToolExecutionFailed）；
//! 自行管理时限的工具（time_limit_output）超时时以文本结果返回。
//! 每次调用输出结构化审计日志（JSON）。特殊工具不经过这里。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::ToolRegistry;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(format!("{tool_name}: {e}"))),
            Err(_) => tool
                .time_limit_output(self.timeout.as_secs())
                .ok_or_else(|| AgentError::ToolTimeout(tool_name.to_string())),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Map};

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn args_schema(&self) -> Map<String, Value> {
            Map::new()
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let executor = ToolExecutor::new(registry, 5);
        let out = executor.execute("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_by_name() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let err = executor.execute("web_search", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool 'web_search' not found in available tools.");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy).unwrap();
        let executor = ToolExecutor::new(registry, 1);
        let err = executor.execute("sleepy", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(name) if name == "sleepy"));
    }

    struct SelfTimed;

    #[async_trait]
    impl Tool for SelfTimed {
        fn name(&self) -> &str {
            "self_timed"
        }
        fn description(&self) -> &str {
            "sleeps past the executor limit"
        }
        fn args_schema(&self) -> Map<String, Value> {
            Map::new()
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
        fn time_limit_output(&self, secs: u64) -> Option<String> {
            Some(format!("limit {secs}s"))
        }
    }

    #[tokio::test]
    async fn test_self_timed_tool_reports_timeout_as_text() {
        let mut registry = ToolRegistry::new();
        registry.register(SelfTimed).unwrap();
        let executor = ToolExecutor::new(registry, 1);
        let out = executor.execute("self_timed", json!({})).await.unwrap();
        assert_eq!(out, "limit 1s");
    }
}
