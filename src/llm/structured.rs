//! 结构化输出：schemars 生成 JSON Schema，serde 在边界处反序列化
//!
//! 生成客户端只负责返回 JSON；形状校验统一在 `generate_structured` 完成，
//! 不符合时转为 LlmError::SchemaValidation，供 tool-decision 重试。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 传给生成客户端的输出约束
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

impl OutputSchema {
    pub fn of<T: JsonSchema>(name: &'static str) -> Self {
        let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        Self { name, schema }
    }

    /// 注入 system 消息的说明文本
    pub fn instruction(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.schema).unwrap_or_default();
        format!(
            "Respond with a single JSON object (`{}`) that conforms to this JSON Schema. \
             Output only the JSON object, without markdown or any other text.\n{}",
            self.name, schema
        )
    }
}

/// 可作为结构化输出的类型
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    const NAME: &'static str;
}

/// 发起一次结构化调用并在边界处反序列化
pub async fn generate_structured<T: StructuredOutput>(
    llm: &dyn LlmClient,
    messages: &[Message],
) -> Result<T, LlmError> {
    let schema = OutputSchema::of::<T>(T::NAME);
    let value = llm.complete_structured(messages, &schema).await?;
    serde_json::from_value(value).map_err(|e| LlmError::SchemaValidation {
        schema: T::NAME.to_string(),
        detail: e.to_string(),
    })
}

/// 从模型文本中提取 JSON 对象（```json ... ``` 块或首个 `{` 到末个 `}`）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end >= start).then(|| &trimmed[start..=end])
}

/// 解析模型文本为 JSON 值；解析失败视为 schema 不符
pub fn parse_json_output(schema: &OutputSchema, output: &str) -> Result<Value, LlmError> {
    let json = extract_json(output).ok_or_else(|| LlmError::SchemaValidation {
        schema: schema.name.to_string(),
        detail: format!("no JSON object in output: {output}"),
    })?;
    serde_json::from_str(json).map_err(|e| LlmError::SchemaValidation {
        schema: schema.name.to_string(),
        detail: format!("{e}: {json}"),
    })
}
