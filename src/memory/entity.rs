//! 实体记忆：从对话中提炼的持久事实（人物、地点、目标、决定……）
//!
//! 每次 chat 完成后调用一次 `query`，用 LLM 结构化输出整体替换旧的实体表（不合并、不留版本）。
//! 实体表只被 tool-decision 的提示词读取，不影响当轮回复。

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm::{generate_structured, LlmClient, LlmError, StructuredOutput};
use crate::memory::{ChatMemory, Message, Role};
use crate::prompt::{self, PromptKind};

/// 实体表：名称/类型 → 详情
pub type EntityMap = Map<String, Value>;

/// 首次查询前的占位条目
pub const SENTINEL_KEY: &str = "none";

/// EntityMemory 调用的结构化输出
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Entities {
    /// Dictionary of entities extracted from the conversation. Keys are entity names or types
    /// (e.g. 'person', 'location', 'goal'), values are their details.
    pub entities: EntityMap,
}

impl StructuredOutput for Entities {
    const NAME: &'static str = "entities";
}

pub struct EntityMemory {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    entities: EntityMap,
}

impl EntityMemory {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let mut entities = Map::new();
        entities.insert(SENTINEL_KEY.to_string(), Value::Null);
        Self {
            llm,
            system_prompt: prompt::load(PromptKind::Entity),
            entities,
        }
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    /// 供提示词嵌入的 JSON 文本
    pub fn render(&self) -> String {
        serde_json::to_string(&self.entities).unwrap_or_else(|_| "{}".to_string())
    }

    /// 基于完整对话与当前实体表刷新实体表；失败时保留旧表
    pub async fn query(&mut self, memory: &ChatMemory) -> Result<&EntityMap, LlmError> {
        let input = format!(
            "Update the entity memory based on the conversation history so far and current entities. \
             Return only the updated entity memory as a JSON dictionary.\n\
             Conversation so far:\n{}\n\
             Current Entity Memory:\n{}",
            render_log(memory.messages()),
            self.render()
        );
        let request = vec![Message::system(self.system_prompt.clone()), Message::user(input)];
        let updated: Entities = generate_structured(self.llm.as_ref(), &request).await?;
        self.entities = updated.entities;
        tracing::debug!(entities = self.entities.len(), "entity memory refreshed");
        Ok(&self.entities)
    }
}

fn render_log(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "Human",
                Role::Assistant => "AI",
                Role::System => "System",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use serde_json::json;

    #[test]
    fn test_initial_value_is_sentinel() {
        let em = EntityMemory::new(Arc::new(ScriptedLlmClient::new()));
        assert_eq!(em.entities().len(), 1);
        assert_eq!(em.entities().get(SENTINEL_KEY), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_query_replaces_wholesale() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_structured("entities", json!({"entities": {"person": "John"}}))
                .with_structured("entities", json!({"entities": {"location": "Seoul"}})),
        );
        let mut em = EntityMemory::new(llm.clone());
        let mut mem = ChatMemory::new(1_000, llm.clone()).with_summary_prompt("s");
        mem.extend(vec![Message::user("I'm John"), Message::assistant("Hi John")])
            .await
            .unwrap();

        em.query(&mem).await.unwrap();
        assert_eq!(em.entities().get("person"), Some(&json!("John")));
        assert!(em.entities().get(SENTINEL_KEY).is_none());

        em.query(&mem).await.unwrap();
        assert_eq!(em.entities().len(), 1);
        assert_eq!(em.entities().get("location"), Some(&json!("Seoul")));

        let request = llm.last_structured_request("entities").unwrap();
        let input = &request.last().unwrap().content;
        assert!(input.contains("Human: I'm John"));
        assert!(input.contains(r#""person":"John""#));
    }

    #[tokio::test]
    async fn test_failed_query_keeps_previous_map() {
        let llm = Arc::new(
            ScriptedLlmClient::new().with_structured("entities", json!({"wrong": 1})),
        );
        let mut em = EntityMemory::new(llm.clone());
        let mem = ChatMemory::new(1_000, llm).with_summary_prompt("s");

        let err = em.query(&mem).await.unwrap_err();
        assert!(matches!(err, LlmError::SchemaValidation { .. }));
        assert!(em.entities().contains_key(SENTINEL_KEY));
    }
}
