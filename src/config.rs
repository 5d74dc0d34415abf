//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLAN_AGENT__*` 覆盖
//! （双下划线表示嵌套，如 `PLAN_AGENT__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::RetryConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub retry: RetryConfig,
    pub memory: MemorySection,
    pub tools: ToolsSection,
}

/// [agent] 段：会话标识、尝试次数上限、记忆预算、是否流式回复
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 未设置时每次启动生成随机 UUID
    pub session_id: Option<String>,
    pub recursion_limit: usize,
    /// 对话记忆字符预算，超出后整体摘要
    pub max_memory_tokens: usize,
    pub stream: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            session_id: None,
            recursion_limit: 5,
            max_memory_tokens: 10_000,
            stream: true,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock；openai 且没有 OPENAI_API_KEY 时回退到 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次非流式请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [memory] 段：持久化目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub dir: PathBuf,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("memory"),
        }
    }
}

impl MemorySection {
    pub fn chat_memory_path(&self) -> PathBuf {
        self.dir.join("chat_memory.json")
    }
}

/// [tools] 段：工具超时、描述文件目录、代码执行
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 设置后导出工具描述到该目录，校验时从磁盘读取
    pub descriptions_dir: Option<PathBuf>,
    pub code: CodeToolConfig,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            descriptions_dir: None,
            code: CodeToolConfig::default(),
        }
    }
}

/// [tools.code] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeToolConfig {
    pub interpreter: String,
    pub timeout_secs: u64,
    pub max_output_chars: usize,
}

impl Default for CodeToolConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 5,
            max_output_chars: 4000,
        }
    }
}

/// 从 config 目录加载配置，环境变量 PLAN_AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PLAN_AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLAN_AGENT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
