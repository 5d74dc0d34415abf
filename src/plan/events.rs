//! PlanAgent 过程事件：由调用方决定打印、转发或忽略

use serde::Serialize;

use crate::core::AgentPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 阶段切换
    Phase { phase: AgentPhase },
    /// 过程记录新增一行（仅 debug 模式发送）
    Transcript { line: String },
    /// 最终回复的一小段（流式输出）
    ResponseChunk { text: String },
    /// 最终回复结束
    ResponseDone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let ev = AgentEvent::Phase {
            phase: AgentPhase::Validating,
        };
        assert_eq!(
            serde_json::to_string(&ev).unwrap(),
            r#"{"type":"phase","phase":"validating"}"#
        );
        assert_eq!(
            serde_json::to_string(&AgentEvent::ResponseDone).unwrap(),
            r#"{"type":"response_done"}"#
        );
    }
}
