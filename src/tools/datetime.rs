//! 当前日期时间工具

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{args_schema_of, Tool};

pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

#[derive(Deserialize, JsonSchema)]
struct DatetimeArgs {
    /// The user's question about the current date or time
    query: String,
    /// strftime format of the returned value
    #[serde(default = "default_format")]
    format: String,
}

pub struct DatetimeTool;

#[async_trait]
impl Tool for DatetimeTool {
    fn name(&self) -> &str {
        "get_datetime"
    }

    fn description(&self) -> &str {
        "Return the current local date and time formatted with the given strftime format. \
         Use it whenever the answer depends on today's date or the current time."
    }

    fn args_schema(&self) -> Map<String, Value> {
        args_schema_of::<DatetimeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: DatetimeArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        tracing::debug!(query = %args.query, format = %args.format, "get_datetime");
        let items: Vec<Item<'_>> = StrftimeItems::new(&args.format).collect();
        if items.iter().any(|i| matches!(i, Item::Error)) {
            return Err(format!("invalid datetime format: {}", args.format));
        }
        Ok(Local::now().format_with_items(items.into_iter()).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_default_format_shape() {
        let out = DatetimeTool
            .execute(json!({"query": "what time is it?"}))
            .await
            .unwrap();
        // 2026-01-02 03:04:05
        assert_eq!(out.len(), 19);
        assert_eq!(&out[4..5], "-");
        assert_eq!(&out[13..14], ":");
    }

    #[tokio::test]
    async fn test_custom_format() {
        let out = DatetimeTool
            .execute(json!({"query": "year", "format": "%Y"}))
            .await
            .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_bad_format_is_an_error() {
        let err = DatetimeTool
            .execute(json!({"query": "q", "format": "%Q"}))
            .await
            .unwrap_err();
        assert!(err.contains("%Q"));
    }

    #[test]
    fn test_args_schema_lists_both_fields() {
        let args = DatetimeTool.args_schema();
        assert!(args.contains_key("query"));
        assert!(args.contains_key("format"));
    }
}
