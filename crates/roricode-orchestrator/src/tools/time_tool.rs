// current_time tool

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use serde::Deserialize;
use serde_json::{Value, json};

use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters};

#[derive(Debug, Default, Deserialize)]
struct TimeArgs {
    #[serde(default)]
    format: Option<String>,
}

/// Returns the current local date and time.
#[derive(Debug, Default)]
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    fn render<Tz: TimeZone>(now: &DateTime<Tz>, format: Option<&str>) -> Result<Value, ToolError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let rendered = match format.map(str::trim) {
            None | Some("" | "iso") => now.to_rfc3339_opts(SecondsFormat::Secs, false),
            Some("human") => now.format("%B %-d, %Y at %-I:%M %p %Z").to_string(),
            Some("date") => now.format("%Y-%m-%d").to_string(),
            Some("time") => now.format("%H:%M:%S").to_string(),
            Some("unix") => return Ok(json!(now.timestamp())),
            Some(custom) => {
                if StrftimeItems::new(custom).any(|item| matches!(item, Item::Error)) {
                    return Err(ToolError::invalid("current_time", format!("invalid format string '{custom}'")));
                }
                now.format(custom).to_string()
            }
        };
        Ok(json!(rendered))
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time"
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new().add_property(
            "format",
            "string",
            "Time format: 'iso' (default), 'human', 'date', 'time', 'unix', \
             or a strftime string like '%Y-%m-%d %H:%M:%S'",
            false,
        )
    }

    async fn execute(&self, _ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: TimeArgs = args.parse()?;
        Self::render(&Local::now(), args.format.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_named_formats() {
        let now = fixed();
        assert_eq!(CurrentTimeTool::render(&now, None).unwrap(), json!("2024-03-09T14:05:07+00:00"));
        assert_eq!(CurrentTimeTool::render(&now, Some("date")).unwrap(), json!("2024-03-09"));
        assert_eq!(CurrentTimeTool::render(&now, Some("time")).unwrap(), json!("14:05:07"));
        assert_eq!(CurrentTimeTool::render(&now, Some("unix")).unwrap(), json!(1_709_993_107));
        assert_eq!(
            CurrentTimeTool::render(&now, Some("human")).unwrap(),
            json!("March 9, 2024 at 2:05 PM UTC")
        );
    }

    #[test]
    fn test_custom_format() {
        let now = fixed();
        assert_eq!(CurrentTimeTool::render(&now, Some("%d/%m/%Y")).unwrap(), json!("09/03/2024"));
        assert!(CurrentTimeTool::render(&now, Some("%Q")).is_err());
    }

    #[tokio::test]
    async fn test_execute_without_arguments() {
        let args = ToolArguments::from_json("current_time", "", &[]).unwrap();
        let value = CurrentTimeTool.execute(&ToolContext::new("."), args).await.unwrap();
        assert!(value.as_str().is_some_and(|s| s.contains('T')));
    }
}
