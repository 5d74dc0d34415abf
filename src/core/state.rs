//! 编排状态机阶段
//!
//! PLANNING → ACTING → VALIDATING → (PLANNING | RESPONDING) → DONE。
//! PlanAgent 每次切换阶段都经过 `can_transition_to` 校验并推送 Phase 事件。

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Idle,
    Planning,
    Acting,
    Validating,
    Responding,
    Done,
}

impl AgentPhase {
    /// 合法的阶段迁移
    pub fn can_transition_to(self, next: AgentPhase) -> bool {
        use AgentPhase::*;
        matches!(
            (self, next),
            (Idle, Planning)
                | (Idle, Responding)
                | (Done, Planning)
                | (Done, Responding)
                | (Planning, Acting)
                | (Acting, Validating)
                | (Validating, Planning)
                | (Validating, Responding)
                | (Responding, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Planning => "planning",
            AgentPhase::Acting => "acting",
            AgentPhase::Validating => "validating",
            AgentPhase::Responding => "responding",
            AgentPhase::Done => "done",
        }
    }
}
