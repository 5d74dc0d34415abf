//! 对话持久化
//!
//! PersistenceStore 只在 ChatMemory 的 load / save 边界使用。JsonFilePersistence 把日志写成单个
//! JSON 文件（多会话共用同一文件时后写者覆盖）；InMemoryPersistence 供测试使用。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::memory::{Message, Role};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid memory file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// 对话日志的持久化后端
pub trait PersistenceStore: Send + Sync {
    /// 读取日志；尚无存档时返回 None
    fn load(&self) -> Result<Option<Vec<Message>>, PersistenceError>;

    fn save(&self, messages: &[Message]) -> Result<(), PersistenceError>;
}

/// 单文件 JSON 持久化，每条消息含 role + content（+ 可选 image）
#[derive(Debug)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceStore for JsonFilePersistence {
    fn load(&self) -> Result<Option<Vec<Message>>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let messages: Vec<SerMessage> = serde_json::from_str(&data)?;
        messages
            .into_iter()
            .map(SerMessage::into_message)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// 父目录不存在时自动创建
    fn save(&self, messages: &[Message]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ser: Vec<SerMessage> = messages.iter().map(SerMessage::from_message).collect();
        std::fs::write(&self.path, serde_json::to_string_pretty(&ser)?)?;
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SerMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

impl SerMessage {
    fn from_message(m: &Message) -> Self {
        Self {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            }
            .to_string(),
            content: m.content.clone(),
            image: m.image.clone(),
        }
    }

    fn into_message(self) -> Result<Message, PersistenceError> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            other => return Err(PersistenceError::Other(format!("unknown role: {other}"))),
        };
        Ok(Message {
            role,
            content: self.content,
            image: self.image,
        })
    }
}

/// 进程内持久化（测试用）；`failing()` 构造的实例每次读写都报错
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    saved: Mutex<Option<Vec<Message>>>,
    fail: bool,
}

impl InMemoryPersistence {
    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(None),
            fail: true,
        }
    }

    pub fn snapshot(&self) -> Option<Vec<Message>> {
        self.saved.lock().ok().and_then(|s| s.clone())
    }
}

impl PersistenceStore for InMemoryPersistence {
    fn load(&self) -> Result<Option<Vec<Message>>, PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Other("store unavailable".to_string()));
        }
        let saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError::Other(e.to_string()))?;
        Ok(saved.clone())
    }

    fn save(&self, messages: &[Message]) -> Result<(), PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Other("store unavailable".to_string()));
        }
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError::Other(e.to_string()))?;
        *saved = Some(messages.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePersistence::new(dir.path().join("chat_memory.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_and_keeps_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePersistence::new(dir.path().join("nested/chat_memory.json"));
        let messages = vec![
            Message::user_with_image("what is this?", "memory/image/cat.png"),
            Message::assistant("a cat"),
        ];
        store.save(&messages).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, messages);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_memory.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFilePersistence::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Format(_))));
    }
}
