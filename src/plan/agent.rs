//! PlanAgent：规划 → 执行 → 校验 →（重新规划 | 回复）主循环
//!
//! 每次 `chat` 调用在本地过程记录（Transcript）中累积文本行：
//! 规划调用读取记忆 + 过程记录；每个步骤先经 ToolValidator 校验形状，特殊工具按名称优先处理，
//! 普通工具在需要时通过带退避重试的决策调用补全输入，再经 ToolExecutor 执行；
//! 校验调用只读取过程记录。通过或尝试次数用尽后生成回复（可流式、可取消），
//! 过程记录与回复作为一对消息写入记忆，随后处理待保存标记并刷新实体记忆。

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, AgentPhase, ErrorClass, RecoveryPolicy};
use crate::llm::{generate_structured, with_retry, LlmClient, RetryConfig};
use crate::memory::{ChatMemory, EntityMemory, Message};
use crate::plan::transcript::{self, Transcript, MAX_ATTEMPTS_NOTICE};
use crate::plan::{AgentEvent, Plan, PlanStep, StepVerdict, ToolDecision, ToolValidator, ValidationVerdict};
use crate::prompt::{self, PromptKind};
use crate::tools::{
    descriptors_prompt, DescriptionStore, InMemoryDescriptions, MemoryEffect, ToolExecutor,
};

pub const DEFAULT_RECURSION_LIMIT: usize = 5;
pub const DEFAULT_MAX_MEMORY_TOKENS: usize = 10_000;

/// 渲染后的各调用 system 提示词；tool 模板保留 `{TOOL_FOR_CURRENT_STEP}` 占位符
#[derive(Debug, Clone)]
pub struct AgentPrompts {
    pub plan: String,
    pub tool: String,
    pub validation: String,
    pub response: String,
}

impl AgentPrompts {
    /// 加载模板并填入工具描述
    pub fn load(executor: &ToolExecutor) -> Self {
        let registry = executor.registry();
        let common = descriptors_prompt(&registry.common_descriptors());
        let special = descriptors_prompt(&registry.special_descriptors());
        let tools = [
            ("COMMON_TOOL_DESC", common.as_str()),
            ("SPECIAL_TOOL_DESC", special.as_str()),
        ];
        Self {
            plan: prompt::render(&prompt::load(PromptKind::Plan), &tools),
            tool: prompt::load(PromptKind::Tool),
            validation: prompt::load(PromptKind::Validation),
            response: prompt::render(&prompt::load(PromptKind::Response), &tools),
        }
    }
}

pub struct PlanAgentBuilder {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    session_id: Option<String>,
    descriptions: Option<Arc<dyn DescriptionStore>>,
    memory: Option<ChatMemory>,
    prompts: Option<AgentPrompts>,
    retry: RetryConfig,
    recursion_limit: usize,
    max_memory_tokens: usize,
    stream: bool,
    event_tx: Option<mpsc::UnboundedSender<AgentEvent>>,
    cancel_token: CancellationToken,
}

impl PlanAgentBuilder {
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn descriptions(mut self, store: Arc<dyn DescriptionStore>) -> Self {
        self.descriptions = Some(store);
        self
    }

    /// 自定义对话记忆（例如带持久化存储）；设置后 max_memory_tokens 不再生效
    pub fn memory(mut self, memory: ChatMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn prompts(mut self, prompts: AgentPrompts) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn max_memory_tokens(mut self, max_tokens: usize) -> Self {
        self.max_memory_tokens = max_tokens;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn event_tx(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn build(self) -> PlanAgent {
        let descriptions = self.descriptions.unwrap_or_else(|| {
            Arc::new(InMemoryDescriptions::from_registry(self.executor.registry()))
        });
        let prompts = self
            .prompts
            .unwrap_or_else(|| AgentPrompts::load(&self.executor));
        let memory = self
            .memory
            .unwrap_or_else(|| ChatMemory::new(self.max_memory_tokens, self.llm.clone()));
        PlanAgent {
            session_id: self
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            entity_memory: EntityMemory::new(self.llm.clone()),
            llm: self.llm,
            executor: self.executor,
            validator: ToolValidator::new(descriptions),
            memory,
            prompts,
            retry: self.retry,
            recovery: RecoveryPolicy::new(),
            recursion_limit: self.recursion_limit,
            stream: self.stream,
            event_tx: self.event_tx,
            cancel_token: self.cancel_token,
            phase: AgentPhase::Idle,
            save_requested: false,
        }
    }
}

/// 一个会话一个 PlanAgent；记忆与实体记忆只归它所有
pub struct PlanAgent {
    session_id: String,
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    validator: ToolValidator,
    memory: ChatMemory,
    entity_memory: EntityMemory,
    prompts: AgentPrompts,
    retry: RetryConfig,
    recovery: RecoveryPolicy,
    recursion_limit: usize,
    stream: bool,
    event_tx: Option<mpsc::UnboundedSender<AgentEvent>>,
    cancel_token: CancellationToken,
    phase: AgentPhase,
    save_requested: bool,
}

impl PlanAgent {
    pub fn builder(llm: Arc<dyn LlmClient>, executor: ToolExecutor) -> PlanAgentBuilder {
        PlanAgentBuilder {
            llm,
            executor,
            session_id: None,
            descriptions: None,
            memory: None,
            prompts: None,
            retry: RetryConfig::default(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_memory_tokens: DEFAULT_MAX_MEMORY_TOKENS,
            stream: true,
            event_tx: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    pub fn entity_memory(&self) -> &EntityMemory {
        &self.entity_memory
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 替换取消令牌（已取消的令牌不可复位，调用方可每轮换新）
    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel_token = token;
    }

    /// 从持久化存储加载记忆；失败只记录日志，会话以空记忆继续
    pub fn load_memory(&mut self) -> usize {
        match self.memory.load() {
            Ok(n) => {
                tracing::info!(session = %self.session_id, messages = n, "memory loaded");
                n
            }
            Err(msg) => {
                tracing::warn!(session = %self.session_id, class = ?ErrorClass::Soft, "{msg}");
                0
            }
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn enter(&mut self, next: AgentPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = self.phase.as_str(), to = next.as_str(), "unexpected phase transition");
        }
        tracing::info!(session = %self.session_id, phase = next.as_str(), "phase");
        self.phase = next;
        self.emit(AgentEvent::Phase { phase: next });
    }

    fn record(&self, transcript: &mut Transcript, line: String, debug: bool) {
        tracing::debug!(session = %self.session_id, "{line}");
        if debug {
            self.emit(AgentEvent::Transcript { line: line.clone() });
        }
        transcript.push(line);
    }

    /// 记忆 + 过程记录（作为一条 user 消息）
    fn with_memory(&self, system: &str, transcript: &Transcript) -> Vec<Message> {
        let mut request = Vec::with_capacity(self.memory.len() + 2);
        request.push(Message::system(system));
        request.extend(self.memory.messages().iter().cloned());
        request.push(Message::user(transcript.join()));
        request
    }

    /// 处理一条用户输入，返回最终回复；致命错误终止本次调用且不写入记忆
    pub async fn chat(&mut self, user_input: &str, debug: bool) -> Result<String, AgentError> {
        let result = self.run(user_input, debug).await;
        if let Err(e) = &result {
            let class = self.recovery.classify(e);
            tracing::error!(session = %self.session_id, ?class, error = %e, "chat aborted");
        }
        result
    }

    async fn run(&mut self, user_input: &str, debug: bool) -> Result<String, AgentError> {
        self.phase = AgentPhase::Idle;
        let mut transcript = Transcript::new();
        let mut recursion = 0;
        let mut accepted = false;

        self.record(&mut transcript, transcript::input_line(user_input), debug);
        while recursion < self.recursion_limit && !accepted {
            self.record(&mut transcript, transcript::attempt_line(recursion + 1), debug);

            self.enter(AgentPhase::Planning);
            let request = self.with_memory(&self.prompts.plan, &transcript);
            let plan: Plan = generate_structured(self.llm.as_ref(), &request).await?;
            self.record(&mut transcript, transcript::plan_line(&plan.plan), debug);
            if plan.plan.is_empty() {
                return Err(AgentError::EmptyPlan);
            }

            self.enter(AgentPhase::Acting);
            self.act(&plan, &mut transcript, debug).await?;

            self.enter(AgentPhase::Validating);
            let request = vec![
                Message::system(self.prompts.validation.clone()),
                Message::user(transcript.join()),
            ];
            let verdict: ValidationVerdict = generate_structured(self.llm.as_ref(), &request).await?;
            if verdict.is_valid {
                self.record(&mut transcript, transcript::accepted_line(&verdict.message), debug);
                accepted = true;
            } else {
                self.record(&mut transcript, transcript::rejected_line(&verdict.message), debug);
                recursion += 1;
            }
        }

        if !accepted {
            self.record(&mut transcript, MAX_ATTEMPTS_NOTICE.to_string(), debug);
        }

        self.enter(AgentPhase::Responding);
        let response = self.respond(&transcript).await?;

        self.memory
            .extend(vec![
                Message::user(transcript.join()),
                Message::assistant(response.clone()),
            ])
            .await?;

        if self.save_requested {
            match self.memory.save() {
                Ok(true) => tracing::info!(session = %self.session_id, "memory saved"),
                Ok(false) => {
                    tracing::debug!(session = %self.session_id, "no persistence store, save skipped")
                }
                Err(msg) => {
                    tracing::warn!(session = %self.session_id, class = ?ErrorClass::Soft, "{msg}")
                }
            }
            self.save_requested = false;
        }

        if let Err(e) = self.entity_memory.query(&self.memory).await {
            tracing::warn!(session = %self.session_id, error = %e, "entity memory refresh failed");
        }

        self.enter(AgentPhase::Done);
        Ok(response)
    }

    async fn act(
        &mut self,
        plan: &Plan,
        transcript: &mut Transcript,
        debug: bool,
    ) -> Result<(), AgentError> {
        for (index, raw) in plan.plan.iter().enumerate() {
            let k = index + 1;
            let verdict = self.validator.validate(raw);
            if let StepVerdict::Invalid(message) = &verdict {
                tracing::warn!(step = k, class = ?ErrorClass::RecoverableWithinAttempt, "{message}");
                self.record(transcript, transcript::step_error_line(k, message), debug);
                break;
            }
            let step = match PlanStep::from_raw(raw) {
                Ok(step) => step,
                Err(e) => {
                    let message = format!("Invalid step: {e}");
                    self.record(transcript, transcript::step_error_line(k, &message), debug);
                    break;
                }
            };

            if let Some(special) = self.executor.registry().special(&step.tool) {
                let outcome = special.invoke(&step.message);
                match outcome.effect {
                    Some(MemoryEffect::RequestSave) => self.save_requested = true,
                    Some(MemoryEffect::Clear) => self.memory.clear(),
                    None => {}
                }
                self.record(transcript, transcript::step_output_line(k, &outcome.output), debug);
                continue;
            }

            let decision = match verdict {
                StepVerdict::Jump => ToolDecision::from_step(&step),
                _ => self.decide(&step, transcript).await?,
            };
            self.record(transcript, transcript::decision_line(k, &decision), debug);

            let output = self
                .executor
                .execute(&decision.tool, Value::Object(decision.tool_input.clone()))
                .await?;
            self.record(transcript, transcript::tool_output_line(k, &output), debug);
        }
        Ok(())
    }

    /// 决策调用：占位行只在调用期间存在；schema 不符时有限次退避重试
    async fn decide(
        &self,
        step: &PlanStep,
        transcript: &mut Transcript,
    ) -> Result<ToolDecision, AgentError> {
        transcript.push(transcript::current_step_line(step, &self.entity_memory.render()));
        let system = prompt::render(
            &self.prompts.tool,
            &[(
                "TOOL_FOR_CURRENT_STEP",
                &self.executor.registry().common_tool_prompt(&step.tool),
            )],
        );
        let request = self.with_memory(&system, transcript);
        let result = with_retry(
            &self.retry,
            |e| self.recovery.is_retryable(e),
            || generate_structured::<ToolDecision>(self.llm.as_ref(), &request),
        )
        .await;
        transcript.pop();
        Ok(result?)
    }

    async fn respond(&self, transcript: &Transcript) -> Result<String, AgentError> {
        let request = self.with_memory(&self.prompts.response, transcript);
        if !self.stream {
            let text = self.llm.complete(&request).await?;
            self.emit(AgentEvent::ResponseChunk { text: text.clone() });
            self.emit(AgentEvent::ResponseDone);
            return Ok(text);
        }

        let mut stream = self.llm.complete_stream(&request).await?;
        let mut response = String::new();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    tracing::info!(session = %self.session_id, "response stream cancelled");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => {
                        self.emit(AgentEvent::ResponseChunk { text: chunk.clone() });
                        response.push_str(&chunk);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }
        self.emit(AgentEvent::ResponseDone);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn agent(llm: Arc<ScriptedLlmClient>) -> PlanAgent {
        let executor = ToolExecutor::new(ToolRegistry::with_special_tools(), 5);
        PlanAgent::builder(llm, executor).stream(false).build()
    }

    #[tokio::test]
    async fn test_zero_recursion_limit_responds_directly() {
        let llm = Arc::new(ScriptedLlmClient::new().with_text("nothing to do"));
        let executor = ToolExecutor::new(ToolRegistry::with_special_tools(), 5);
        let mut agent = PlanAgent::builder(llm.clone(), executor)
            .recursion_limit(0)
            .stream(false)
            .build();
        agent.chat("hi", false).await.unwrap();
        assert_eq!(llm.structured_calls("plan"), 0);
        let request = llm.last_text_request().unwrap();
        assert!(request.last().unwrap().content.ends_with(MAX_ATTEMPTS_NOTICE));
        assert_eq!(agent.phase(), AgentPhase::Done);
    }

    #[tokio::test]
    async fn test_validation_sees_only_transcript() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_structured("plan", json!({"plan": [{"tool": "thought", "message": "ok"}]}))
                .with_structured("validation", json!({"is_valid": true, "message": "fine"}))
                .with_structured("entities", json!({"entities": {}}))
                .with_text("done"),
        );
        let mut agent = agent(llm.clone());
        agent.chat("hi", false).await.unwrap();
        let request = llm.last_structured_request("validation").unwrap();
        assert_eq!(request.len(), 2);
        assert!(request[1].content.contains("Step 1 Output: ok"));
    }

    #[tokio::test]
    async fn test_debug_emits_transcript_events() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .with_structured("plan", json!({"plan": [{"tool": "thought", "message": "ok"}]}))
                .with_structured("validation", json!({"is_valid": true}))
                .with_structured("entities", json!({"entities": {}}))
                .with_text("done"),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = ToolExecutor::new(ToolRegistry::with_special_tools(), 5);
        let mut agent = PlanAgent::builder(llm, executor).event_tx(tx).build();
        agent.chat("hi", true).await.unwrap();
        drop(agent);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert!(events.contains(&AgentEvent::Transcript {
            line: "Input: hi".into()
        }));
        assert!(events.contains(&AgentEvent::Phase {
            phase: AgentPhase::Validating
        }));
        assert_eq!(events.last(), Some(&AgentEvent::Phase { phase: AgentPhase::Done }));
    }

    #[tokio::test]
    async fn test_cancelled_stream_keeps_partial_text() {
        let llm = Arc::new(ScriptedLlmClient::new().with_text("a b c"));
        let executor = ToolExecutor::new(ToolRegistry::with_special_tools(), 5);
        let token = CancellationToken::new();
        token.cancel();
        let agent = PlanAgent::builder(llm, executor).cancel_token(token).build();
        let response = agent.respond(&Transcript::new()).await.unwrap();
        assert_eq!(response, "");
    }
}
