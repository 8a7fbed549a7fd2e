//! Employee record tools: registering new hires and keeping their details current.

use std::sync::Arc;

use async_trait::async_trait;
use proto::ToolError;
use serde::Deserialize;

use crate::Tool;
use crate::email::parse_recipient;
use crate::hris::{Employee, EmployeeUpdate, Hris, NewEmployee};
use crate::time_off::parse_employee_id;

#[derive(Debug, Deserialize)]
struct RegistrationArgs {
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    employee_id: String,
    #[serde(flatten)]
    update: EmployeeUpdate,
}

fn required(field: &str, value: String) -> Result<String, ToolError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ToolError::InvalidArgs(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn describe(employee: &Employee) -> String {
    format!(
        "Employee {}: {} {}, email {}, location {}, hired {}.",
        employee.id,
        employee.first_name,
        employee.last_name,
        employee.email,
        employee.location,
        employee.hire_date
    )
}

/// Creates the HRIS record for a new hire
pub struct EmployeeRegistrationTool {
    hris: Arc<dyn Hris>,
}

impl EmployeeRegistrationTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for EmployeeRegistrationTool {
    fn name(&self) -> &str {
        "employee_registration_tool"
    }

    fn description(&self) -> &str {
        "useful to register a new hire in the HR system once you know their details. The input \
         is a JSON object with \"first_name\", \"last_name\" and \"email\". Returns the new \
         employee id."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let args: RegistrationArgs = serde_json::from_str(input.trim())
            .map_err(|e| ToolError::InvalidArgs(format!("expected a JSON object: {e}")))?;
        let employee = self
            .hris
            .add_employee(NewEmployee {
                first_name: required("first_name", args.first_name)?,
                last_name: required("last_name", args.last_name)?,
                email: parse_recipient(&args.email)?,
            })
            .await?;
        Ok(format!(
            "{} {} has been registered with employee id {}.",
            employee.first_name, employee.last_name, employee.id
        ))
    }
}

/// Reads an employee's record
pub struct EmployeeLookupTool {
    hris: Arc<dyn Hris>,
}

impl EmployeeLookupTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for EmployeeLookupTool {
    fn name(&self) -> &str {
        "employee_lookup_tool"
    }

    fn description(&self) -> &str {
        "useful to look up the details the HR system holds for an employee. The input is the \
         employee id."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let employee_id = parse_employee_id(input)?;
        let employee = self.hris.get_employee(&employee_id).await?;
        Ok(describe(&employee))
    }
}

/// Changes fields of an employee's record
pub struct EmployeeUpdateTool {
    hris: Arc<dyn Hris>,
}

impl EmployeeUpdateTool {
    pub fn new(hris: Arc<dyn Hris>) -> Self {
        Self { hris }
    }
}

#[async_trait]
impl Tool for EmployeeUpdateTool {
    fn name(&self) -> &str {
        "employee_update_tool"
    }

    fn description(&self) -> &str {
        "useful to correct or update an employee's details. The input is a JSON object with \
         \"employee_id\" and any of \"first_name\", \"last_name\", \"email\" or \"location\"."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let UpdateArgs {
            employee_id,
            mut update,
        } = serde_json::from_str(input.trim())
            .map_err(|e| ToolError::InvalidArgs(format!("expected a JSON object: {e}")))?;
        let employee_id = parse_employee_id(&employee_id)?;
        if update.is_empty() {
            return Err(ToolError::InvalidArgs(
                "name at least one of first_name, last_name, email or location".to_string(),
            ));
        }
        update.first_name = update
            .first_name
            .map(|v| required("first_name", v))
            .transpose()?;
        update.last_name = update
            .last_name
            .map(|v| required("last_name", v))
            .transpose()?;
        update.location = update
            .location
            .map(|v| required("location", v))
            .transpose()?;
        update.email = update.email.as_deref().map(parse_recipient).transpose()?;

        let employee = self.hris.edit_employee(&employee_id, update).await?;
        Ok(format!("Record updated. {}", describe(&employee)))
    }
}
