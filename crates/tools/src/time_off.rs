//! Vacation tools: filing, checking and cancelling time off.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use proto::ToolError;
use serde::Deserialize;
use serde_json::Value;

use crate::Tool;
use crate::hris::{HOURS_PER_WORKING_DAY, Hris, TimeOffRequest};

#[derive(Debug, Deserialize)]
struct TimeOffArgs {
    employee_id: String,
    start: NaiveDate,
    end: NaiveDate,
}

/// Counts Monday-to-Friday days between `start` and `end`, both inclusive.
pub fn count_working_days(start: NaiveDate, end: NaiveDate) -> u32 {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}

/// Files a vacation request for an employee
pub struct TimeOffRequestTool {
    hris: Arc<dyn Hris>,
}

impl TimeOffRequestTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for TimeOffRequestTool {
    fn name(&self) -> &str {
        "time_off_request_tool"
    }

    fn description(&self) -> &str {
        "useful to request vacation time off for an employee. The input is a JSON object with \
         \"employee_id\", \"start\" and \"end\" dates formatted as YYYY-MM-DD (both inclusive)."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let args: TimeOffArgs = serde_json::from_str(input.trim())
            .map_err(|e| ToolError::InvalidArgs(format!("expected a JSON object: {e}")))?;
        let employee_id = parse_employee_id(&args.employee_id)?;
        if args.end < args.start {
            return Err(ToolError::InvalidArgs("end date is before start date".to_string()));
        }
        let days = count_working_days(args.start, args.end);
        if days == 0 {
            return Err(ToolError::InvalidArgs(
                "the requested period contains no working days".to_string(),
            ));
        }

        let receipt = self
            .hris
            .request_time_off(TimeOffRequest {
                employee_id,
                start: args.start,
                end: args.end,
                hours: days * HOURS_PER_WORKING_DAY,
            })
            .await?;

        Ok(format!(
            "Time off requested from {} to {} ({days} working days). Request id: {}. Remaining balance: {} hours.",
            args.start, args.end, receipt.request_id, receipt.remaining_hours
        ))
    }
}

/// Accepts an employee id given bare, quoted or as `{"employee_id": ...}`.
pub(crate) fn parse_employee_id(input: &str) -> Result<String, ToolError> {
    let input = input.trim();
    let id = match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(object)) => match object.get("employee_id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ToolError::InvalidArgs(
                    "expected an \"employee_id\" field".to_string(),
                ));
            }
        },
        Ok(Value::Number(id)) => id.to_string(),
        _ => input.trim_matches(|c| matches!(c, '"' | '\'' | '`')).to_string(),
    };
    let id = id.trim();
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(ToolError::InvalidArgs(format!("'{id}' is not an employee id")));
    }
    Ok(id.to_string())
}

/// Reports remaining vacation and the requests on file
pub struct TimeOffBalanceTool {
    hris: Arc<dyn Hris>,
}

impl TimeOffBalanceTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for TimeOffBalanceTool {
    fn name(&self) -> &str {
        "time_off_balance_tool"
    }

    fn description(&self) -> &str {
        "useful to check how much vacation an employee has left and which time off \
         requests are on file. The input is the employee id."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let employee_id = parse_employee_id(input)?;
        let hours = self.hris.balance_hours(&employee_id).await?;
        let requests = self.hris.time_off_requests(&employee_id).await?;

        let mut out = format!(
            "Employee {employee_id} has {hours} hours ({} days) of vacation remaining.",
            hours / HOURS_PER_WORKING_DAY
        );
        if requests.is_empty() {
            out.push_str(" No time off requests on file.");
        } else {
            out.push_str(" Requests on file:");
            for request in &requests {
                out.push_str(&format!(
                    "\n- {}: {} to {} ({} hours)",
                    request.request_id, request.start, request.end, request.hours
                ));
            }
        }
        Ok(out)
    }
}

/// Cancels a filed request and returns its hours to the balance
pub struct CancelTimeOffTool {
    hris: Arc<dyn Hris>,
}

impl CancelTimeOffTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for CancelTimeOffTool {
    fn name(&self) -> &str {
        "cancel_time_off_tool"
    }

    fn description(&self) -> &str {
        "useful to cancel a time off request. The input is the request id returned when the \
         request was filed."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let request_id = input
            .trim()
            .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
            .trim();
        if request_id.is_empty() {
            return Err(ToolError::InvalidArgs(
                "expected the id of the request to cancel".to_string(),
            ));
        }
        let receipt = self.hris.cancel_time_off(request_id).await?;
        Ok(format!(
            "Time off request {} has been cancelled. Remaining balance: {} hours.",
            receipt.request_id, receipt.remaining_hours
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hris::{InMemoryHris, NewEmployee};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    async fn hris_with_employee(balance_days: u32) -> Arc<InMemoryHris> {
        let hris = Arc::new(InMemoryHris::new(balance_days));
        hris.add_employee(NewEmployee {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@company.com".to_string(),
        })
        .await
        .expect("add employee");
        hris
    }

    #[test]
    fn count_working_days_skips_weekends() {
        // 2024-05-06 is a Monday.
        assert_eq!(count_working_days(date("2024-05-06"), date("2024-05-10")), 5);
        assert_eq!(count_working_days(date("2024-05-06"), date("2024-05-12")), 5);
        assert_eq!(count_working_days(date("2024-05-06"), date("2024-05-13")), 6);
        assert_eq!(count_working_days(date("2024-05-11"), date("2024-05-12")), 0);
        assert_eq!(count_working_days(date("2024-05-08"), date("2024-05-08")), 1);
    }

    #[test]
    fn parse_employee_id_accepts_common_shapes() {
        assert_eq!(parse_employee_id(" 42 ").expect("bare"), "42");
        assert_eq!(parse_employee_id("\"42\"").expect("quoted"), "42");
        assert_eq!(parse_employee_id(r#"{"employee_id": 42}"#).expect("object"), "42");
        assert!(parse_employee_id("").is_err());
        assert!(parse_employee_id("employee 42").is_err());
    }

    #[tokio::test]
    async fn request_deducts_hours_from_balance() {
        let hris = hris_with_employee(25).await;
        let tool = TimeOffRequestTool::new(hris.clone());

        let out = tool
            .execute(r#"{"employee_id":"1","start":"2024-05-06","end":"2024-05-10"}"#)
            .await
            .expect("request");
        assert!(out.contains("5 working days"));
        assert!(out.contains("Remaining balance: 160 hours"));
        assert_eq!(hris.balance_hours("1").await.expect("balance"), 160);
    }

    #[tokio::test]
    async fn request_fails_when_balance_is_insufficient() {
        let hris = hris_with_employee(1).await;
        let tool = TimeOffRequestTool::new(hris.clone());
        let err = tool
            .execute(r#"{"employee_id":"1","start":"2024-05-06","end":"2024-05-07"}"#)
            .await
            .expect_err("insufficient");
        assert!(err.to_string().contains("insufficient vacation balance"));
        assert_eq!(hris.balance_hours("1").await.expect("balance"), 8);
    }

    #[tokio::test]
    async fn request_for_unregistered_employee_fails() {
        let tool = TimeOffRequestTool::new(Arc::new(InMemoryHris::default()));
        let err = tool
            .execute(r#"{"employee_id":"42","start":"2024-05-06","end":"2024-05-07"}"#)
            .await
            .expect_err("unknown employee");
        assert!(err.to_string().contains("no employee with id '42'"));
    }

    #[tokio::test]
    async fn request_rejects_invalid_periods() {
        let tool = TimeOffRequestTool::new(hris_with_employee(25).await);
        for input in [
            "next week please",
            r#"{"employee_id":"1","start":"2024-05-10","end":"2024-05-06"}"#,
            r#"{"employee_id":"1","start":"2024-05-11","end":"2024-05-12"}"#,
            r#"{"employee_id":" ","start":"2024-05-06","end":"2024-05-07"}"#,
        ] {
            let err = tool.execute(input).await.expect_err(input);
            assert!(matches!(err, ToolError::InvalidArgs(_)), "{input}: {err}");
        }
    }

    #[tokio::test]
    async fn balance_lists_requests_and_cancel_restores_them() {
        let hris = hris_with_employee(25).await;
        let request = TimeOffRequestTool::new(hris.clone());
        let balance = TimeOffBalanceTool::new(hris.clone());
        let cancel = CancelTimeOffTool::new(hris.clone());

        let out = balance.execute("1").await.expect("balance");
        assert_eq!(
            out,
            "Employee 1 has 200 hours (25 days) of vacation remaining. No time off requests on file."
        );

        request
            .execute(r#"{"employee_id":"1","start":"2024-05-06","end":"2024-05-07"}"#)
            .await
            .expect("request");
        let filed = hris.time_off_requests("1").await.expect("list");
        let request_id = filed[0].request_id.clone();

        let out = balance.execute("1").await.expect("balance");
        assert!(out.contains("184 hours (23 days)"));
        assert!(out.contains(&format!("- {request_id}: 2024-05-06 to 2024-05-07 (16 hours)")));

        let out = cancel.execute(&request_id).await.expect("cancel");
        assert!(out.contains("Remaining balance: 200 hours"));
        let err = cancel.execute(&request_id).await.expect_err("already cancelled");
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
        assert!(matches!(
            cancel.execute("  ").await,
            Err(ToolError::InvalidArgs(_))
        ));
    }
}
