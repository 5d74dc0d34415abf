//! 离线与测试用 LLM 客户端
//!
//! - MockLlmClient：无需 API，计划永远是一步 `thought`，校验永远通过，回复回显用户输入
//! - ScriptedLlmClient：按 schema 名称排队返回结构化结果、按顺序返回文本结果，并记录每次调用

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, OutputSchema, TokenStream};
use crate::memory::{Message, Role};

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// 按空白切分并保留分隔符，模拟逐 token 到达
fn into_chunks(text: &str) -> TokenStream {
    let chunks: Vec<Result<String, LlmError>> = text
        .split_inclusive(' ')
        .map(|s| Ok(s.to_string()))
        .collect();
    Box::pin(stream::iter(chunks))
}

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        Ok(format!("Echo from Mock: {}", last_user(messages)))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.complete(messages).await?;
        Ok(into_chunks(&content))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        let input = last_user(messages).lines().next().unwrap_or_default();
        let value = match schema.name {
            "plan" => json!({"plan": [{"tool": "thought", "message": format!("Echo from Mock: {input}")}]}),
            "tool_decision" => json!({"tool": "echo", "tool_input": {"text": input}, "message": ""}),
            "validation" => json!({"is_valid": true, "message": "mock validation"}),
            "entities" => json!({"entities": {}}),
            other => {
                return Err(LlmError::Request(format!(
                    "mock has no response for schema `{other}`"
                )))
            }
        };
        Ok(value)
    }
}

#[derive(Default)]
struct Script {
    structured: HashMap<String, VecDeque<Value>>,
    text: VecDeque<String>,
    structured_requests: HashMap<String, Vec<Vec<Message>>>,
    text_requests: Vec<Vec<Message>>,
}

/// 脚本化客户端：测试中精确控制每次生成的结果
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<Script>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为名为 `schema` 的结构化调用排队一个返回值
    pub fn with_structured(self, schema: &str, value: Value) -> Self {
        self.push_structured(schema, value);
        self
    }

    /// 为文本调用（complete / complete_stream）排队一个返回值
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn push_structured(&self, schema: &str, value: Value) {
        if let Ok(mut script) = self.script.lock() {
            script
                .structured
                .entry(schema.to_string())
                .or_default()
                .push_back(value);
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.text.push_back(text.into());
        }
    }

    pub fn structured_calls(&self, schema: &str) -> usize {
        self.script
            .lock()
            .map(|s| s.structured_requests.get(schema).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn text_calls(&self) -> usize {
        self.script.lock().map(|s| s.text_requests.len()).unwrap_or(0)
    }

    pub fn structured_requests(&self, schema: &str) -> Vec<Vec<Message>> {
        self.script
            .lock()
            .map(|s| s.structured_requests.get(schema).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn last_structured_request(&self, schema: &str) -> Option<Vec<Message>> {
        self.structured_requests(schema).pop()
    }

    pub fn last_text_request(&self) -> Option<Vec<Message>> {
        self.script
            .lock()
            .ok()
            .and_then(|s| s.text_requests.last().cloned())
    }

    fn next_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut script = self
            .script
            .lock()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        script.text_requests.push(messages.to_vec());
        script
            .text
            .pop_front()
            .ok_or_else(|| LlmError::Request("no scripted text response".to_string()))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.next_text(messages)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let text = self.next_text(messages)?;
        Ok(into_chunks(&text))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        let mut script = self
            .script
            .lock()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        script
            .structured_requests
            .entry(schema.name.to_string())
            .or_default()
            .push(messages.to_vec());
        script
            .structured
            .get_mut(schema.name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                LlmError::Request(format!("no scripted response for schema `{}`", schema.name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let out = MockLlmClient
            .complete(&[Message::system("sys"), Message::user("hello")])
            .await
            .unwrap();
        assert_eq!(out, "Echo from Mock: hello");
    }

    #[tokio::test]
    async fn test_scripted_stream_concatenates_to_text() {
        let llm = ScriptedLlmClient::new().with_text("It is noon now.");
        let chunks: Vec<String> = llm
            .complete_stream(&[Message::user("time?")])
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), "It is noon now.");
        assert_eq!(llm.text_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_exhausted_queue_is_an_error() {
        let llm = ScriptedLlmClient::new();
        let schema = OutputSchema {
            name: "plan",
            schema: Value::Null,
        };
        let err = llm
            .complete_structured(&[Message::user("x")], &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
        assert_eq!(llm.structured_calls("plan"), 1);
    }
}
