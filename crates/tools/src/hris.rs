//! HR information system: employee records and vacation bookkeeping.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use proto::ToolError;
use serde::Deserialize;
use tracing::info;

pub const HOURS_PER_WORKING_DAY: u32 = 8;
const DEFAULT_BALANCE_DAYS: u32 = 25;
const DEFAULT_LOCATION: &str = "London, UK";

/// Employee record as held by the HRIS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub location: String,
    pub hire_date: NaiveDate,
}

/// Details collected from a new hire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Fields to change on an existing record; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
}

impl EmployeeUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.location.is_none()
    }
}

/// A vacation request sized in hours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOffRequest {
    pub employee_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hours: u32,
}

/// HRIS answer to a filed or cancelled request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOffReceipt {
    pub request_id: String,
    pub remaining_hours: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOffStatus {
    Requested,
    Canceled,
}

/// A request on file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOffEntry {
    pub request_id: String,
    pub employee_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hours: u32,
    pub status: TimeOffStatus,
}

/// HR information system backend
#[async_trait]
pub trait Hris: Send + Sync {
    /// Registers a new hire and returns the stored record.
    async fn add_employee(&self, employee: NewEmployee) -> Result<Employee, ToolError>;

    async fn get_employee(&self, employee_id: &str) -> Result<Employee, ToolError>;

    async fn edit_employee(
        &self,
        employee_id: &str,
        update: EmployeeUpdate,
    ) -> Result<Employee, ToolError>;

    /// Remaining vacation hours.
    async fn balance_hours(&self, employee_id: &str) -> Result<u32, ToolError>;

    /// Files a time-off request and returns the receipt.
    async fn request_time_off(
        &self,
        request: TimeOffRequest,
    ) -> Result<TimeOffReceipt, ToolError>;

    /// Requests still on file for an employee, oldest first.
    async fn time_off_requests(&self, employee_id: &str) -> Result<Vec<TimeOffEntry>, ToolError>;

    /// Cancels a request and gives its hours back.
    async fn cancel_time_off(&self, request_id: &str) -> Result<TimeOffReceipt, ToolError>;
}

struct EmployeeRecord {
    employee: Employee,
    balance_hours: u32,
}

#[derive(Default)]
struct HrisState {
    next_employee_id: u64,
    employees: HashMap<String, EmployeeRecord>,
    requests: Vec<TimeOffEntry>,
}

/// HRIS kept in process memory
pub struct InMemoryHris {
    default_balance_hours: u32,
    state: Mutex<HrisState>,
}

impl InMemoryHris {
    /// Creates an HRIS granting `default_balance_days` of vacation to each new hire.
    pub fn new(default_balance_days: u32) -> Self {
        Self {
            default_balance_hours: default_balance_days * HOURS_PER_WORKING_DAY,
            state: Mutex::new(HrisState::default()),
        }
    }
}

impl Default for InMemoryHris {
    fn default() -> Self {
        Self::new(DEFAULT_BALANCE_DAYS)
    }
}

fn no_employee(employee_id: &str) -> ToolError {
    ToolError::ExecutionFailed(format!("no employee with id '{employee_id}'"))
}

fn record_mut<'a>(
    state: &'a mut HrisState,
    employee_id: &str,
) -> Result<&'a mut EmployeeRecord, ToolError> {
    state
        .employees
        .get_mut(employee_id)
        .ok_or_else(|| no_employee(employee_id))
}

#[async_trait]
impl Hris for InMemoryHris {
    async fn add_employee(&self, employee: NewEmployee) -> Result<Employee, ToolError> {
        let mut state = self.state.lock();
        if state
            .employees
            .values()
            .any(|r| r.employee.email.eq_ignore_ascii_case(&employee.email))
        {
            return Err(ToolError::ExecutionFailed(format!(
                "an employee with email {} is already registered",
                employee.email
            )));
        }

        state.next_employee_id += 1;
        let record = Employee {
            id: state.next_employee_id.to_string(),
            first_name: employee.first_name,
            last_name: employee.last_name,
            email: employee.email,
            location: DEFAULT_LOCATION.to_string(),
            hire_date: Local::now().date_naive(),
        };
        info!(employee_id = %record.id, email = %record.email, "Employee registered");
        state.employees.insert(
            record.id.clone(),
            EmployeeRecord {
                employee: record.clone(),
                balance_hours: self.default_balance_hours,
            },
        );
        Ok(record)
    }

    async fn get_employee(&self, employee_id: &str) -> Result<Employee, ToolError> {
        self.state
            .lock()
            .employees
            .get(employee_id)
            .map(|r| r.employee.clone())
            .ok_or_else(|| no_employee(employee_id))
    }

    async fn edit_employee(
        &self,
        employee_id: &str,
        update: EmployeeUpdate,
    ) -> Result<Employee, ToolError> {
        let mut state = self.state.lock();
        let employee = &mut record_mut(&mut state, employee_id)?.employee;
        if let Some(first_name) = update.first_name {
            employee.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            employee.last_name = last_name;
        }
        if let Some(email) = update.email {
            employee.email = email;
        }
        if let Some(location) = update.location {
            employee.location = location;
        }
        info!(employee_id, "Employee record updated");
        Ok(employee.clone())
    }

    async fn balance_hours(&self, employee_id: &str) -> Result<u32, ToolError> {
        self.state
            .lock()
            .employees
            .get(employee_id)
            .map(|r| r.balance_hours)
            .ok_or_else(|| no_employee(employee_id))
    }

    async fn request_time_off(
        &self,
        request: TimeOffRequest,
    ) -> Result<TimeOffReceipt, ToolError> {
        let mut state = self.state.lock();
        let record = record_mut(&mut state, &request.employee_id)?;
        if request.hours > record.balance_hours {
            return Err(ToolError::ExecutionFailed(format!(
                "insufficient vacation balance: requested {}h, available {}h",
                request.hours, record.balance_hours
            )));
        }
        record.balance_hours -= request.hours;
        let remaining_hours = record.balance_hours;

        let request_id = uuid::Uuid::new_v4().to_string();
        info!(
            employee_id = %request.employee_id,
            request_id = %request_id,
            hours = request.hours,
            "Time-off request filed"
        );
        state.requests.push(TimeOffEntry {
            request_id: request_id.clone(),
            employee_id: request.employee_id,
            start: request.start,
            end: request.end,
            hours: request.hours,
            status: TimeOffStatus::Requested,
        });
        Ok(TimeOffReceipt {
            request_id,
            remaining_hours,
        })
    }

    async fn time_off_requests(&self, employee_id: &str) -> Result<Vec<TimeOffEntry>, ToolError> {
        let state = self.state.lock();
        if !state.employees.contains_key(employee_id) {
            return Err(no_employee(employee_id));
        }
        Ok(state
            .requests
            .iter()
            .filter(|r| r.employee_id == employee_id && r.status == TimeOffStatus::Requested)
            .cloned()
            .collect())
    }

    async fn cancel_time_off(&self, request_id: &str) -> Result<TimeOffReceipt, ToolError> {
        let mut state = self.state.lock();
        let entry = state
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| {
                ToolError::ExecutionFailed(format!("no time-off request with id '{request_id}'"))
            })?;
        if entry.status == TimeOffStatus::Canceled {
            return Err(ToolError::ExecutionFailed(format!(
                "time-off request '{request_id}' is already cancelled"
            )));
        }
        entry.status = TimeOffStatus::Canceled;
        let (employee_id, hours) = (entry.employee_id.clone(), entry.hours);

        let record = record_mut(&mut state, &employee_id)?;
        record.balance_hours += hours;
        info!(employee_id = %employee_id, request_id, hours, "Time-off request cancelled");
        Ok(TimeOffReceipt {
            request_id: request_id.to_string(),
            remaining_hours: record.balance_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> NewEmployee {
        NewEmployee {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@company.com".to_string(),
        }
    }

    fn week_off(employee_id: &str) -> TimeOffRequest {
        TimeOffRequest {
            employee_id: employee_id.to_string(),
            start: NaiveDate::from_ymd_opt(2024, 5, 6).expect("date"),
            end: NaiveDate::from_ymd_opt(2024, 5, 10).expect("date"),
            hours: 40,
        }
    }

    #[tokio::test]
    async fn add_employee_assigns_ids_and_default_balance() {
        let hris = InMemoryHris::default();
        let record = hris.add_employee(jane()).await.expect("add");
        assert_eq!(record.id, "1");
        assert_eq!(record.location, "London, UK");
        assert_eq!(hris.balance_hours("1").await.expect("balance"), 200);

        let err = hris.add_employee(jane()).await.expect_err("duplicate");
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn edit_employee_changes_only_given_fields() {
        let hris = InMemoryHris::default();
        hris.add_employee(jane()).await.expect("add");

        let updated = hris
            .edit_employee(
                "1",
                EmployeeUpdate {
                    location: Some("Lisbon, PT".to_string()),
                    ..EmployeeUpdate::default()
                },
            )
            .await
            .expect("edit");
        assert_eq!(updated.location, "Lisbon, PT");
        assert_eq!(updated.first_name, "Jane");
        assert_eq!(hris.get_employee("1").await.expect("get"), updated);
    }

    #[tokio::test]
    async fn unknown_employee_is_an_error() {
        let hris = InMemoryHris::default();
        assert!(hris.get_employee("9").await.is_err());
        assert!(hris.balance_hours("9").await.is_err());
        assert!(hris.request_time_off(week_off("9")).await.is_err());
    }

    #[tokio::test]
    async fn cancel_restores_hours_once() {
        let hris = InMemoryHris::default();
        hris.add_employee(jane()).await.expect("add");
        let receipt = hris.request_time_off(week_off("1")).await.expect("request");
        assert_eq!(receipt.remaining_hours, 160);
        assert_eq!(hris.time_off_requests("1").await.expect("list").len(), 1);

        let cancelled = hris.cancel_time_off(&receipt.request_id).await.expect("cancel");
        assert_eq!(cancelled.remaining_hours, 200);
        assert!(hris.time_off_requests("1").await.expect("list").is_empty());

        let err = hris
            .cancel_time_off(&receipt.request_id)
            .await
            .expect_err("second cancel");
        assert!(err.to_string().contains("already cancelled"));
    }
}
