//! Calendar scheduling tool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use parking_lot::Mutex;
use proto::ToolError;
use serde::Deserialize;
use tracing::info;

use crate::Tool;
use crate::email::parse_recipient;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct EventArgs {
    summary: String,
    start: String,
    end: String,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    timezone: Option<String>,
}

/// A validated calendar event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub summary: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: Vec<String>,
    /// IANA zone name the naive times are expressed in.
    pub timezone: String,
}

/// Calendar backend
#[async_trait]
pub trait Calendar: Send + Sync {
    /// Creates the event and returns its id.
    async fn schedule_event(&self, event: EventRequest) -> Result<String, ToolError>;
}

/// Calendar that keeps events in process memory
#[derive(Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<(String, EventRequest)>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all scheduled events with their ids.
    pub fn events(&self) -> Vec<(String, EventRequest)> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Calendar for InMemoryCalendar {
    async fn schedule_event(&self, event: EventRequest) -> Result<String, ToolError> {
        let id = uuid::Uuid::new_v4().to_string();
        info!(event_id = %id, summary = %event.summary, start = %event.start, "Calendar event created");
        self.events.lock().push((id.clone(), event));
        Ok(id)
    }
}

/// Parses a model-provided timestamp.
///
/// RFC 3339 input is converted to UTC and reported as such; naive input is
/// kept as-is and interpreted in the event's timezone.
fn parse_time(field: &str, value: &str) -> Result<(NaiveDateTime, Option<&'static str>), ToolError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok((dt.naive_utc(), Some("UTC")));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| (dt, None))
        .ok_or_else(|| {
            ToolError::InvalidArgs(format!(
                "{field} '{value}' is not a date-time like 2024-05-01T14:30"
            ))
        })
}

fn parse_event(input: &str) -> Result<EventRequest, ToolError> {
    let args: EventArgs = serde_json::from_str(input.trim())
        .map_err(|e| ToolError::InvalidArgs(format!("expected a JSON object: {e}")))?;

    let summary = args.summary.trim().to_string();
    if summary.is_empty() {
        return Err(ToolError::InvalidArgs("summary must not be empty".to_string()));
    }

    let (start, start_zone) = parse_time("start", &args.start)?;
    let (end, end_zone) = parse_time("end", &args.end)?;
    if end <= start {
        return Err(ToolError::InvalidArgs("end must be after start".to_string()));
    }

    let attendees = args
        .attendees
        .iter()
        .map(|a| parse_recipient(a))
        .collect::<Result<Vec<_>, _>>()?;

    let timezone = match start_zone.or(end_zone) {
        Some(utc) => utc.to_string(),
        None => args
            .timezone
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| "UTC".to_string()),
    };

    Ok(EventRequest {
        summary,
        start,
        end,
        attendees,
        timezone,
    })
}

/// Schedules a calendar event with optional attendees
pub struct CalendarEventTool {
    calendar: Arc<dyn Calendar>,
}

impl CalendarEventTool {
    pub fn new(calendar: Arc<dyn Calendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarEventTool {
    fn name(&self) -> &str {
        "calendar_event_tool"
    }

    fn description(&self) -> &str {
        "useful to schedule a calendar event such as an onboarding meeting. The input is a JSON object \
         with \"summary\", \"start\" and \"end\" (e.g. 2024-05-01T14:30), an optional \"attendees\" \
         list of email addresses and an optional \"timezone\" (default UTC)."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let event = parse_event(input)?;
        let summary = event.summary.clone();
        let start = event.start;
        let id = self.calendar.schedule_event(event).await?;
        Ok(format!(
            "Event '{summary}' scheduled for {} (event id: {id})",
            start.format("%Y-%m-%d %H:%M")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_accepts_naive_times_with_timezone() {
        let event = parse_event(
            r#"{"summary":"Onboarding","start":"2024-05-01T14:30","end":"2024-05-01T15:30",
                "attendees":["a@b.com"],"timezone":"Europe/London"}"#,
        )
        .expect("valid event");
        assert_eq!(event.summary, "Onboarding");
        assert_eq!(event.start.format("%H:%M").to_string(), "14:30");
        assert_eq!(event.attendees, vec!["a@b.com".to_string()]);
        assert_eq!(event.timezone, "Europe/London");
    }

    #[test]
    fn parse_event_converts_rfc3339_to_utc() {
        let event = parse_event(
            r#"{"summary":"Sync","start":"2024-05-01T14:30:00+02:00","end":"2024-05-01T15:00:00+02:00","timezone":"Europe/Madrid"}"#,
        )
        .expect("valid event");
        assert_eq!(event.start.format("%H:%M").to_string(), "12:30");
        assert_eq!(event.timezone, "UTC");
    }

    #[test]
    fn parse_event_rejects_bad_input() {
        assert!(parse_event("tomorrow at 2pm").is_err());
        assert!(parse_event(r#"{"summary":" ","start":"2024-05-01T14:30","end":"2024-05-01T15:30"}"#).is_err());
        assert!(parse_event(r#"{"summary":"x","start":"2024-05-01T15:30","end":"2024-05-01T14:30"}"#).is_err());
        assert!(parse_event(r#"{"summary":"x","start":"soon","end":"2024-05-01T14:30"}"#).is_err());
        assert!(
            parse_event(r#"{"summary":"x","start":"2024-05-01T14:30","end":"2024-05-01T15:30","attendees":["nobody"]}"#)
                .is_err()
        );
    }

    #[tokio::test]
    async fn calendar_tool_schedules_event_and_reports_id() {
        let calendar = Arc::new(InMemoryCalendar::new());
        let tool = CalendarEventTool::new(calendar.clone());

        let out = tool
            .execute(r#"{"summary":"Welcome lunch","start":"2024-05-02 12:00","end":"2024-05-02 13:00"}"#)
            .await
            .expect("schedule");

        let events = calendar.events();
        assert_eq!(events.len(), 1);
        assert!(out.contains("Welcome lunch"));
        assert!(out.contains(&events[0].0));
        assert_eq!(events[0].1.timezone, "UTC");
    }
}
