//! 对话记忆：消息日志 + 长度计数 + 超预算时的硬摘要
//!
//! `tokens` 始终等于日志中所有消息 content 长度（按字符计）之和：追加时增量累加，
//! 整体替换（摘要、加载）后从头重算。超过 `max_tokens` 时调用 LLM 生成一条摘要，
//! 并用这一条摘要替换整个日志（有损压缩）。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, LlmError};
use crate::memory::PersistenceStore;
use crate::prompt::{self, PromptKind};

/// 摘要调用时附加的用户指令
pub const SUMMARY_INPUT: &str = "Summarize the conversation so far.";

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息；`image` 仅出现在多模态的用户消息上（图片路径或 URL）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: None,
        }
    }

    /// 文本 + 图片的多模态用户消息
    pub fn user_with_image(content: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: Some(image.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            image: None,
        }
    }

    /// 计入记忆预算的长度（字符数）
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }
}

fn count_tokens(messages: &[Message]) -> usize {
    messages.iter().map(Message::size).sum()
}

/// 会话记忆：一个 PlanAgent 独占一份
pub struct ChatMemory {
    messages: Vec<Message>,
    tokens: usize,
    max_tokens: usize,
    summarizer: Arc<dyn LlmClient>,
    summary_prompt: String,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl ChatMemory {
    pub fn new(max_tokens: usize, summarizer: Arc<dyn LlmClient>) -> Self {
        Self {
            messages: Vec::new(),
            tokens: 0,
            max_tokens,
            summarizer,
            summary_prompt: prompt::load(PromptKind::Summary),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.summary_prompt = prompt.into();
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 追加消息；累计长度超过预算时触发硬摘要。
    /// 摘要失败时追加的消息仍保留（计数保持一致），错误向上传播。
    pub async fn extend(&mut self, entries: Vec<Message>) -> Result<(), LlmError> {
        self.tokens += count_tokens(&entries);
        self.messages.extend(entries);

        if self.tokens > self.max_tokens {
            tracing::info!(
                tokens = self.tokens,
                max_tokens = self.max_tokens,
                "memory over budget, summarizing"
            );
            self.summarize().await?;
        }
        Ok(())
    }

    async fn summarize(&mut self) -> Result<(), LlmError> {
        let mut request = Vec::with_capacity(self.messages.len() + 2);
        request.push(Message::system(self.summary_prompt.clone()));
        request.extend(self.messages.iter().cloned());
        request.push(Message::user(SUMMARY_INPUT));

        let summary = self.summarizer.complete(&request).await?;
        self.replace(vec![Message::assistant(summary)]);
        Ok(())
    }

    fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.tokens = count_tokens(&self.messages);
    }

    /// 从持久化存储加载日志；失败时保留空日志并返回错误信息
    pub fn load(&mut self) -> Result<usize, String> {
        let Some(store) = self.store.clone() else {
            return Ok(0);
        };
        match store.load() {
            Ok(Some(messages)) => {
                self.replace(messages);
                Ok(self.messages.len())
            }
            Ok(None) => Ok(0),
            Err(e) => {
                self.replace(Vec::new());
                Err(format!(
                    "An error occurred while loading the conversation history: {e}"
                ))
            }
        }
    }

    /// 将当前日志写入持久化存储；未挂接存储时返回 Ok(false)，失败时返回错误信息
    pub fn save(&self) -> Result<bool, String> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        store
            .save(&self.messages)
            .map(|()| true)
            .map_err(|e| format!("An error occurred while saving the conversation history: {e}"))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.tokens = 0;
    }
}
