//! 工具描述存储：ToolValidator 按工具名查询声明的 args 形状
//!
//! - InMemoryDescriptions：启动时由注册表生成，只读
//! - DirectoryDescriptions：每个工具一个 `<dir>/<tool>.json`，每次查询都重新读取；
//!   export 只在内容变化时重写文件

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::tools::{ToolDescriptor, ToolRegistry};

#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("format: {0}")]
    Format(#[from] serde_json::Error),
}

pub trait DescriptionStore: Send + Sync {
    /// 返回工具声明的 `args`；工具无描述时为 None，描述中缺少 args 时为 Value::Null
    fn get_schema(&self, tool: &str) -> Result<Option<Value>, DescriptionError>;
}

pub struct InMemoryDescriptions {
    args: HashMap<String, Value>,
}

impl InMemoryDescriptions {
    pub fn from_descriptors(descriptors: &[ToolDescriptor]) -> Self {
        let args = descriptors
            .iter()
            .map(|d| (d.name.clone(), Value::Object(d.args.clone())))
            .collect();
        Self { args }
    }

    pub fn from_registry(registry: &ToolRegistry) -> Self {
        Self::from_descriptors(&registry.descriptors())
    }
}

impl DescriptionStore for InMemoryDescriptions {
    fn get_schema(&self, tool: &str) -> Result<Option<Value>, DescriptionError> {
        Ok(self.args.get(tool).cloned())
    }
}

pub struct DirectoryDescriptions {
    dir: PathBuf,
}

impl DirectoryDescriptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, tool: &str) -> PathBuf {
        self.dir.join(format!("{tool}.json"))
    }

    /// 导出描述文件，返回实际写入的文件数
    pub fn export(&self, descriptors: &[ToolDescriptor]) -> Result<usize, DescriptionError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut written = 0;
        for descriptor in descriptors {
            let path = self.file_for(&descriptor.name);
            let content = serde_json::to_string_pretty(descriptor)?;
            let unchanged = std::fs::read_to_string(&path)
                .map(|existing| existing == content)
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            std::fs::write(&path, content)?;
            tracing::debug!(tool = %descriptor.name, path = %path.display(), "description exported");
            written += 1;
        }
        Ok(written)
    }
}

impl DescriptionStore for DirectoryDescriptions {
    fn get_schema(&self, tool: &str) -> Result<Option<Value>, DescriptionError> {
        let path = self.file_for(tool);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let desc: Value = serde_json::from_str(&raw)?;
        Ok(Some(desc.get("args").cloned().unwrap_or(Value::Null)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{DatetimeTool, SpecialTool};
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::with_special_tools();
        registry.register(DatetimeTool).unwrap();
        registry
    }

    #[test]
    fn test_in_memory_lookup() {
        let store = InMemoryDescriptions::from_registry(&registry());
        let thought = store.get_schema("thought").unwrap().unwrap();
        assert_eq!(thought, json!({"message": {"title": "Message", "type": "string"}}));
        assert!(store.get_schema("web_search").unwrap().is_none());
    }

    #[test]
    fn test_directory_export_then_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryDescriptions::new(tmp.path().join("descriptions"));
        let descriptors = registry().descriptors();
        assert_eq!(store.export(&descriptors).unwrap(), 4);
        // 第二次导出内容未变，不写文件
        assert_eq!(store.export(&descriptors).unwrap(), 0);

        let args = store.get_schema("get_datetime").unwrap().unwrap();
        assert_eq!(args, Value::Object(descriptors[0].args.clone()));
        assert!(store.get_schema("missing").unwrap().is_none());
    }

    #[test]
    fn test_directory_reports_broken_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        let store = DirectoryDescriptions::new(tmp.path());
        assert!(matches!(
            store.get_schema("broken"),
            Err(DescriptionError::Format(_))
        ));
    }

    #[test]
    fn test_export_rewrites_changed_file() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryDescriptions::new(tmp.path());
        let descriptor = SpecialTool::Thought.descriptor();
        std::fs::write(tmp.path().join("thought.json"), "{}").unwrap();
        assert_eq!(store.export(&[descriptor]).unwrap(), 1);
    }
}
