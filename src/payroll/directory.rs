//! Employee directory maintenance.
//!
//! The directory is populated from an employee master sheet. Each row is
//! upserted by its trimmed `employee_id`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Text;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::ingest::{parse_optional_decimal, round_money, Sheet};
use crate::models::Employee;
use crate::store::PayrollStore;

/// Column that identifies an employee in every sheet.
pub const EMPLOYEE_ID_COLUMN: &str = "employee_id";

const NAME_COLUMN: &str = "name";
const PHONE_COLUMN: &str = "phone";
const AGE_COLUMN: &str = "age";
const BASE_SALARY_COLUMN: &str = "base_salary";

/// Counts from one master-sheet upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Employees that did not exist before.
    pub created: usize,
    /// Existing employees that were overwritten.
    pub updated: usize,
    /// Rows without an employee id.
    pub skipped: usize,
}

/// Creates or updates employees from a master sheet.
///
/// Rows without an `employee_id` are skipped. A missing, unparseable or
/// out-of-range `base_salary` becomes `0.00`; other salaries are rounded to
/// cents. `name`, `phone` and `age` are only written when the sheet has that
/// column. All rows are applied in one transaction.
///
/// # Errors
///
/// Returns [`EngineError::MissingColumn`] if the sheet has no `employee_id`
/// column.
pub async fn upsert_from_sheet(store: &PayrollStore, sheet: &Sheet) -> EngineResult<UpsertSummary> {
    if !sheet.has_column(EMPLOYEE_ID_COLUMN) {
        return Err(EngineError::MissingColumn {
            column: EMPLOYEE_ID_COLUMN.to_string(),
        });
    }

    let has_name = sheet.has_column(NAME_COLUMN);
    let has_phone = sheet.has_column(PHONE_COLUMN);
    let has_age = sheet.has_column(AGE_COLUMN);

    let mut tx = store.begin().await?;
    let mut summary = UpsertSummary::default();

    for row in sheet.rows() {
        let Some(employee_id) = row.get(EMPLOYEE_ID_COLUMN) else {
            summary.skipped += 1;
            continue;
        };

        let parsed = parse_optional_decimal(row.get(BASE_SALARY_COLUMN));
        let base_salary = match parsed.map(round_money) {
            Some(Some(salary)) => salary,
            Some(None) => {
                warn!(
                    file = sheet.file_name(),
                    line = row.line(),
                    employee_id,
                    "Base salary out of range, storing 0.00"
                );
                Decimal::new(0, 2)
            }
            None => Decimal::new(0, 2),
        };

        let existing: Option<Employee> =
            sqlx::query_as("SELECT * FROM employees WHERE employee_id = ?")
                .bind(employee_id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut employee = match existing {
            Some(employee) => {
                summary.updated += 1;
                employee
            }
            None => {
                summary.created += 1;
                Employee::new(employee_id, base_salary)
            }
        };

        employee.base_salary = base_salary;
        if has_name {
            employee.name = row.get(NAME_COLUMN).map(str::to_string);
        }
        if has_phone {
            employee.phone = row.get(PHONE_COLUMN).map(str::to_string);
        }
        if has_age {
            employee.age = row.get(AGE_COLUMN).map(str::to_string);
        }

        sqlx::query(
            "INSERT INTO employees (employee_id, name, phone, age, base_salary)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (employee_id) DO UPDATE
             SET name = excluded.name, phone = excluded.phone, age = excluded.age,
                 base_salary = excluded.base_salary",
        )
        .bind(&employee.employee_id)
        .bind(&employee.name)
        .bind(&employee.phone)
        .bind(&employee.age)
        .bind(Text(employee.base_salary))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        file = sheet.file_name(),
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "Employee master sheet applied"
    );
    Ok(summary)
}

/// Returns every employee ordered by id.
pub async fn list_employees(store: &PayrollStore) -> EngineResult<Vec<Employee>> {
    let employees = sqlx::query_as("SELECT * FROM employees ORDER BY employee_id")
        .fetch_all(store.pool())
        .await?;
    Ok(employees)
}
