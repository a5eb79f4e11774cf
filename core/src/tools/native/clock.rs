use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use crate::tools::{ParamType, ParameterSchema, ParameterSpec, Tool, ToolError};

/// Reports the current time, optionally shifted by a whole-hour offset
#[derive(Debug, Default, Clone)]
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> String {
        "clock.now".to_string()
    }

    fn description(&self) -> String {
        "Get the current date and time (UTC, or shifted by offset_hours)".to_string()
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::from([(
            "offset_hours".to_string(),
            ParameterSpec::optional(ParamType::Integer)
                .with_default(json!(0))
                .describe("Whole hours to add to UTC, between -14 and 14"),
        )])
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let offset = arguments
            .get("offset_hours")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if !(-14..=14).contains(&offset) {
            return Err(ToolError::InvalidArguments(format!(
                "offset_hours out of range: {}",
                offset
            )));
        }

        let now = Utc::now() + Duration::hours(offset);
        Ok(json!({
            "iso8601": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "offset_hours": offset,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_out_of_range_offset() {
        let mut args = Map::new();
        args.insert("offset_hours".into(), json!(20));
        let err = ClockTool.call(args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn reports_date_and_time() {
        let out = ClockTool.call(Map::new()).await.unwrap();
        assert_eq!(out["offset_hours"], 0);
        assert_eq!(out["date"].as_str().map(str::len), Some(10));
    }
}
