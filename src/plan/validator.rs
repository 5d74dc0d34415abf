//! 计划步骤形状校验
//!
//! 只允许 {tool, message, tool_input}，必须含 {tool, message}。带 tool_input 时查询描述存储：
//! 与声明的 args 深度相等则判定为 jump，否则需要决策调用补全。失败一律通过返回值报告。

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::plan::StepVerdict;
use crate::tools::DescriptionStore;

pub const ALLOWED_KEYS: [&str; 3] = ["tool", "message", "tool_input"];
pub const REQUIRED_KEYS: [&str; 2] = ["tool", "message"];

pub struct ToolValidator {
    descriptions: Arc<dyn DescriptionStore>,
}

impl ToolValidator {
    pub fn new(descriptions: Arc<dyn DescriptionStore>) -> Self {
        Self { descriptions }
    }

    pub fn validate(&self, step: &Map<String, Value>) -> StepVerdict {
        let unexpected: Vec<&str> = step
            .keys()
            .map(String::as_str)
            .filter(|k| !ALLOWED_KEYS.contains(k))
            .collect();
        if !unexpected.is_empty() {
            return StepVerdict::Invalid(format!(
                "Unexpected keys present: {}. Allowed keys are {}.",
                unexpected.join(", "),
                ALLOWED_KEYS.join(", ")
            ));
        }

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !step.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return StepVerdict::Invalid(format!("Missing required keys: {}.", missing.join(", ")));
        }

        let Some(tool_input) = step.get("tool_input") else {
            return StepVerdict::Resolve;
        };
        let name = match &step["tool"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.descriptions.get_schema(&name) {
            Ok(None) => {
                StepVerdict::Invalid(format!("Description file not found for tool: {name}."))
            }
            Err(e) => StepVerdict::Invalid(format!("Failed to load description for tool {name}: {e}")),
            Ok(Some(args)) if *tool_input == args => StepVerdict::Jump,
            Ok(Some(_)) => StepVerdict::Resolve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{DescriptionError, DatetimeTool, InMemoryDescriptions, ToolRegistry};
    use serde_json::json;

    fn validator() -> (ToolValidator, Value) {
        let mut registry = ToolRegistry::with_special_tools();
        registry.register(DatetimeTool).unwrap();
        let args = Value::Object(registry.common_descriptors()[0].args.clone());
        let store = Arc::new(InMemoryDescriptions::from_registry(&registry));
        (ToolValidator::new(store), args)
    }

    fn step(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_keys_only_resolves() {
        let (validator, _) = validator();
        for tool in ["get_datetime", "thought", "not_registered"] {
            let verdict = validator.validate(&step(json!({"tool": tool, "message": "m"})));
            assert_eq!(verdict, StepVerdict::Resolve);
        }
    }

    #[test]
    fn test_extra_key_is_named() {
        let (validator, _) = validator();
        let verdict = validator.validate(&step(json!({"tool": "x", "message": "y", "foo": "z"})));
        assert_eq!(verdict.as_str(), "false");
        assert!(verdict.message().contains("foo"));
    }

    #[test]
    fn test_missing_key() {
        let (validator, _) = validator();
        let verdict = validator.validate(&step(json!({"tool": "x"})));
        assert_eq!(verdict, StepVerdict::Invalid("Missing required keys: message.".into()));
    }

    #[test]
    fn test_input_equal_to_args_jumps() {
        let (validator, args) = validator();
        let verdict = validator.validate(&step(json!({
            "tool": "get_datetime", "message": "m", "tool_input": args
        })));
        assert_eq!(verdict, StepVerdict::Jump);
    }

    #[test]
    fn test_near_miss_input_resolves() {
        let (validator, _) = validator();
        let verdict = validator.validate(&step(json!({
            "tool": "get_datetime", "message": "m", "tool_input": {"query": "now"}
        })));
        assert_eq!(verdict, StepVerdict::Resolve);
    }

    #[test]
    fn test_unknown_description() {
        let (validator, _) = validator();
        let verdict = validator.validate(&step(json!({
            "tool": "web_search", "message": "m", "tool_input": {}
        })));
        assert_eq!(
            verdict,
            StepVerdict::Invalid("Description file not found for tool: web_search.".into())
        );
    }

    struct Failing;

    impl DescriptionStore for Failing {
        fn get_schema(&self, _tool: &str) -> Result<Option<Value>, DescriptionError> {
            Err(DescriptionError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn test_load_error_is_reported_not_raised() {
        let validator = ToolValidator::new(Arc::new(Failing));
        let verdict = validator.validate(&step(json!({
            "tool": "echo", "message": "m", "tool_input": {}
        })));
        assert!(verdict.message().contains("disk gone"));
    }
}
