//! Agent 构建器：由 AppConfig 组装一个完整的 PlanAgent
//!
//! 选择 LLM 后端、显式注册工具（单个失败跳过并记录）、可选导出工具描述、
//! 挂接记忆持久化并在启动时加载。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{ChatMemory, JsonFilePersistence};
use crate::plan::{AgentEvent, PlanAgent};
use crate::tools::{
    CodeTool, DatetimeTool, DescriptionStore, DirectoryDescriptions, EchoTool, SpecialTool,
    ToolExecutor, ToolRegistry,
};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    match (provider.as_str(), api_key) {
        ("openai", Some(key)) => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            let mut client = OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key))
                .with_request_timeout(cfg.llm.timeouts.request);
            if let Some(t) = cfg.llm.temperature {
                client = client.with_temperature(t);
            }
            Arc::new(client)
        }
        ("mock", _) => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    event_tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            event_tx: None,
        }
    }

    /// 覆盖配置选出的 LLM 后端
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 普通工具 + 三个特殊工具；构造失败的工具跳过
    pub fn build_tool_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.try_register("get_datetime", || Ok(DatetimeTool));
        tools.try_register("execute_code", || CodeTool::new(&self.config.tools.code));
        tools.try_register("echo", || Ok(EchoTool));
        for special in SpecialTool::ALL {
            if let Err(e) = tools.register_special(special) {
                tracing::warn!(tool = special.name(), error = %e, "[tool:skip] registration failed");
            }
        }
        tracing::info!(tools = ?tools.tool_names(), "tools registered");
        tools
    }

    pub fn build(self) -> Result<PlanAgent, AgentError> {
        let cfg = &self.config;
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(cfg));
        let executor = ToolExecutor::new(self.build_tool_registry(), cfg.tools.tool_timeout_secs);
        let descriptors = executor.registry().descriptors();

        let memory = ChatMemory::new(cfg.agent.max_memory_tokens, llm.clone())
            .with_store(Arc::new(JsonFilePersistence::new(cfg.memory.chat_memory_path())));

        let mut builder = PlanAgent::builder(llm, executor)
            .memory(memory)
            .retry(cfg.retry.clone())
            .recursion_limit(cfg.agent.recursion_limit)
            .stream(cfg.agent.stream);

        if let Some(dir) = &cfg.tools.descriptions_dir {
            let store = DirectoryDescriptions::new(dir);
            let written = store
                .export(&descriptors)
                .map_err(|e| AgentError::Config(format!("export tool descriptions: {e}")))?;
            tracing::info!(dir = %dir.display(), written, "tool descriptions exported");
            builder = builder.descriptions(Arc::new(store) as Arc<dyn DescriptionStore>);
        }
        if let Some(id) = &cfg.agent.session_id {
            builder = builder.session_id(id.clone());
        }
        if let Some(tx) = self.event_tx {
            builder = builder.event_tx(tx);
        }

        let mut agent = builder.build();
        agent.load_memory();
        Ok(agent)
    }
}
