//! 记忆层：对话日志（带预算摘要）、实体记忆、持久化

pub mod conversation;
pub mod entity;
pub mod persistence;

pub use conversation::{ChatMemory, Message, Role, SUMMARY_INPUT};
pub use entity::{Entities, EntityMap, EntityMemory, SENTINEL_KEY};
pub use persistence::{
    InMemoryPersistence, JsonFilePersistence, PersistenceError, PersistenceStore,
};
