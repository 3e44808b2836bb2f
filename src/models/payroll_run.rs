//! Archived payroll history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::{Json, Text};
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{ComponentSnapshot, PayrollStatus};

/// One archived payroll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PayrollRun {
    /// Run identifier.
    pub id: i64,
    /// When the run was archived.
    pub run_timestamp: DateTime<Utc>,
    /// Optional label given at archive time.
    pub name: Option<String>,
    /// The batch that was closed to produce this run.
    pub batch_id: Uuid,
}

/// An immutable copy of a payroll result taken at archive time.
///
/// Employee fields are denormalized so history survives later master-sheet
/// changes. `base_salary` is the figure the result was generated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPayrollResult {
    /// Archived row identifier.
    pub id: i64,
    /// The run this row belongs to.
    pub run_id: i64,
    /// Employee id at archive time.
    pub employee_id: String,
    /// Employee name at archive time.
    pub employee_name: Option<String>,
    /// Base salary used for `final_salary`.
    pub base_salary: Decimal,
    /// Incentive total.
    pub total_incentives: Decimal,
    /// Deduction total.
    pub total_deductions: Decimal,
    /// Final salary.
    pub final_salary: Decimal,
    /// Status when archived; pending results are archived as-is.
    pub status: PayrollStatus,
    /// Rejection reason, if any.
    pub rejection_reason: Option<String>,
    /// Consumed components.
    pub components_snapshot: ComponentSnapshot,
}

impl<'r> FromRow<'r, SqliteRow> for ArchivedPayrollResult {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            employee_id: row.try_get("employee_id")?,
            employee_name: row.try_get("employee_name")?,
            base_salary: row.try_get::<Text<Decimal>, _>("base_salary")?.0,
            total_incentives: row.try_get::<Text<Decimal>, _>("total_incentives")?.0,
            total_deductions: row.try_get::<Text<Decimal>, _>("total_deductions")?.0,
            final_salary: row.try_get::<Text<Decimal>, _>("final_salary")?.0,
            status: row.try_get("status")?,
            rejection_reason: row.try_get("rejection_reason")?,
            components_snapshot: row
                .try_get::<Json<ComponentSnapshot>, _>("components_snapshot")?
                .0,
        })
    }
}
