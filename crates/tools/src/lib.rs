//! Tool trait and the HR assistant's built-in tools.
//!
//! Each tool takes a single string argument and returns a single string.
//! Side effects go through collaborator traits ([`Mailer`], [`Calendar`],
//! [`Hris`], [`DocumentIndex`]) so the agent runtime never sees them.

pub mod calendar;
pub mod email;
pub mod employee;
pub mod hris;
pub mod policy;
pub mod respond;
pub mod time_off;

pub use calendar::{Calendar, CalendarEventTool, EventRequest, InMemoryCalendar};
pub use email::{
    HrPolicyEmailTool, Mailer, OutboxMailer, OutgoingEmail, SlackInviteTool, WelcomeEmailTool,
};
pub use employee::{EmployeeLookupTool, EmployeeRegistrationTool, EmployeeUpdateTool};
pub use hris::{
    Employee, EmployeeUpdate, Hris, InMemoryHris, NewEmployee, TimeOffEntry, TimeOffReceipt,
    TimeOffRequest, TimeOffStatus,
};
pub use policy::{DocumentIndex, KeywordIndex, PolicyQaTool};
pub use respond::RespondTool;
pub use time_off::{CancelTimeOffTool, TimeOffBalanceTool, TimeOffRequestTool};

use async_trait::async_trait;
use proto::ToolError;

/// Trait that all tools must implement
///
/// Implementations are shared across sessions, so `execute` may be called
/// concurrently and must not rely on per-conversation state.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name shown to the model and used for dispatch.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// Whether calling this tool ends the turn with its argument as the answer.
    fn is_terminal(&self) -> bool {
        false
    }
    /// Executes the tool with the model-provided argument.
    async fn execute(&self, input: &str) -> Result<String, ToolError>;
}
