//! Employee model.
//!
//! This module defines the [`Employee`] master record that payroll results
//! are computed against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Text;
use sqlx::{FromRow, Row};

/// Represents an employee in the directory.
///
/// Employees are created or updated by uploading a master sheet and are
/// keyed by `employee_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub employee_id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact phone number, kept as entered.
    #[serde(default)]
    pub phone: Option<String>,
    /// Age, kept as entered.
    #[serde(default)]
    pub age: Option<String>,
    /// Monthly base salary before incentives and deductions.
    pub base_salary: Decimal,
}

impl Employee {
    /// Creates an employee with only an id and base salary.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::models::Employee;
    /// use rust_decimal::Decimal;
    ///
    /// let employee = Employee::new("E001", Decimal::new(500000, 2));
    /// assert_eq!(employee.display_name(), "No Name");
    /// ```
    pub fn new(employee_id: impl Into<String>, base_salary: Decimal) -> Self {
        Self {
            employee_id: employee_id.into(),
            name: None,
            phone: None,
            age: None,
            base_salary,
        }
    }

    /// Returns the name to show for this employee.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("No Name")
    }

    /// Returns true if `needle` (already lowercased) occurs in the employee
    /// id or name.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.employee_id.to_lowercase().contains(needle)
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle))
    }
}

impl<'r> FromRow<'r, SqliteRow> for Employee {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            employee_id: row.try_get("employee_id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            age: row.try_get("age")?,
            base_salary: row.try_get::<Text<Decimal>, _>("base_salary")?.0,
        })
    }
}
