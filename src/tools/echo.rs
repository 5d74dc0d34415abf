//! Echo 工具（测试与 mock 模式用）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{args_schema_of, Tool};

#[derive(Deserialize, JsonSchema)]
struct EchoArgs {
    /// Text to return unchanged
    text: String,
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged. Useful for repeating a message back to the user."
    }

    fn args_schema(&self) -> Map<String, Value> {
        args_schema_of::<EchoArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: EchoArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        Ok(args.text)
    }
}
