//! 代码执行工具：通过配置的解释器运行代码片段
//!
//! 执行前做禁用模式筛查（去空白、小写后匹配），输出截断到 max_output_chars；
//! 超时不是错误，而是以文本结果返回给编排器。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::config::CodeToolConfig;
use crate::tools::{args_schema_of, Tool};

const FORBIDDEN_PATTERNS: &[&str] = &[
    "import os",
    "import sys",
    "subprocess",
    "socket",
    "__import__",
    "open(",
    "eval(",
    "exec(",
];

pub const NO_OUTPUT: &str = "✅ Execution complete (no output)";
pub const DENIED: &str = "❌ Execution denied due to forbidden modules/functions.";

pub fn time_limit_exceeded(secs: u64) -> String {
    format!("⏰ Execution time limit exceeded ({secs} seconds).")
}

#[derive(Deserialize, JsonSchema)]
struct CodeArgs {
    /// Source code to run
    code: String,
    /// Execution time limit in seconds
    timeout: Option<u64>,
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// 命中任一禁用模式时返回该模式
pub fn forbidden_pattern(code: &str) -> Option<&'static str> {
    let normalized = normalize(code);
    FORBIDDEN_PATTERNS
        .iter()
        .copied()
        .find(|p| normalized.contains(&normalize(p)))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect()
    } else {
        s.to_string()
    }
}

pub struct CodeTool {
    interpreter: String,
    default_timeout_secs: u64,
    max_output_chars: usize,
}

impl CodeTool {
    /// 解释器不可用时构造失败（注册时跳过该工具）
    pub fn new(config: &CodeToolConfig) -> Result<Self, String> {
        std::process::Command::new(&config.interpreter)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| format!("interpreter `{}` unavailable: {e}", config.interpreter))?;
        Ok(Self {
            interpreter: config.interpreter.clone(),
            default_timeout_secs: config.timeout_secs,
            max_output_chars: config.max_output_chars,
        })
    }
}

#[async_trait]
impl Tool for CodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute a short code snippet and return what it prints. Use it for calculations, \
         data processing or checking logic. File, network and process access are not allowed."
    }

    fn args_schema(&self) -> Map<String, Value> {
        args_schema_of::<CodeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: CodeArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        if let Some(pattern) = forbidden_pattern(&args.code) {
            tracing::warn!(pattern, "execute_code denied");
            return Ok(DENIED.to_string());
        }

        let secs = args.timeout.unwrap_or(self.default_timeout_secs);
        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(&args.code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("spawn {}: {e}", self.interpreter))?;

        let output = match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
        {
            Ok(result) => result.map_err(|e| e.to_string())?,
            Err(_) => return Ok(time_limit_exceeded(secs)),
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        let text = text.trim_end();
        if text.is_empty() {
            return Ok(NO_OUTPUT.to_string());
        }
        Ok(truncate(text, self.max_output_chars))
    }

    fn time_limit_output(&self, secs: u64) -> Option<String> {
        Some(time_limit_exceeded(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_patterns_ignore_spacing_and_case() {
        assert_eq!(forbidden_pattern("IMPORT   OS"), Some("import os"));
        assert_eq!(forbidden_pattern("x = open ('f')"), Some("open("));
        assert_eq!(forbidden_pattern("print(1 + 1)"), None);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }

    #[test]
    fn test_missing_interpreter_fails_construction() {
        let config = CodeToolConfig {
            interpreter: "definitely-not-an-interpreter-xyz".into(),
            ..CodeToolConfig::default()
        };
        assert!(CodeTool::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_denied_code_is_a_text_result() {
        let tool = CodeTool {
            interpreter: "python3".into(),
            default_timeout_secs: 5,
            max_output_chars: 4000,
        };
        let out = tool
            .execute(serde_json::json!({"code": "import subprocess"}))
            .await
            .unwrap();
        assert_eq!(out, DENIED);
    }

    #[test]
    fn test_executor_time_limit_is_reported_as_text() {
        let tool = CodeTool {
            interpreter: "python3".into(),
            default_timeout_secs: 5,
            max_output_chars: 4000,
        };
        assert_eq!(
            tool.time_limit_output(2).as_deref(),
            Some("⏰ Execution time limit exceeded (2 seconds).")
        );
    }
}
