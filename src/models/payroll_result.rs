//! Payroll result models.
//!
//! This module contains the [`PayrollResult`] type held by the open
//! [`PayrollBatch`], the [`ComponentSnapshot`] of consumed ledger entries it
//! carries, and the [`PayrollStatus`] lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::{Json, Text};
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{Component, ComponentKind, Employee};
use crate::error::{EngineError, EngineResult};

/// Lifecycle status of a payroll result.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PayrollStatus;
///
/// let status: PayrollStatus = "approved".parse().unwrap();
/// assert!(status.is_terminal());
/// assert!(!PayrollStatus::Pending.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PayrollStatus {
    /// Awaiting a decision.
    #[default]
    Pending,
    /// Approved for payment.
    Approved,
    /// Rejected with a reason.
    Rejected,
}

impl PayrollStatus {
    /// The wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Pending => "pending",
            PayrollStatus::Approved => "approved",
            PayrollStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected results never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayrollStatus::Pending)
    }
}

impl fmt::Display for PayrollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayrollStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(PayrollStatus::Pending),
            "approved" => Ok(PayrollStatus::Approved),
            "rejected" => Ok(PayrollStatus::Rejected),
            other => Err(EngineError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A consumed ledger component, copied into a result for display and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The component amount.
    pub amount: Decimal,
    /// The component reason.
    pub reason: Option<String>,
    /// The file the component came from.
    pub source_file: Option<String>,
    /// The component attachment reference.
    pub attachment: Option<String>,
}

impl From<&Component> for SnapshotEntry {
    fn from(component: &Component) -> Self {
        Self {
            amount: component.amount,
            reason: component.reason.clone(),
            source_file: component.source_file.clone(),
            attachment: component.attachment.clone(),
        }
    }
}

/// Every component folded into a result, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Consumed incentives, oldest first.
    #[serde(default)]
    pub incentives: Vec<SnapshotEntry>,
    /// Consumed deductions, oldest first.
    #[serde(default)]
    pub deductions: Vec<SnapshotEntry>,
}

impl ComponentSnapshot {
    /// Appends a consumed component under its kind.
    pub fn record(&mut self, component: &Component) {
        let entry = SnapshotEntry::from(component);
        match component.kind {
            ComponentKind::Incentive => self.incentives.push(entry),
            ComponentKind::Deduction => self.deductions.push(entry),
        }
    }

    /// Total number of entries across both kinds.
    pub fn len(&self) -> usize {
        self.incentives.len() + self.deductions.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The running payroll figure for one employee in the open batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollResult {
    /// Result identifier, used by the approval endpoints.
    pub id: i64,
    /// The batch this result belongs to.
    pub batch_id: Uuid,
    /// The employee this result is for.
    pub employee_id: String,
    /// The employee's base salary as of the latest generation.
    pub base_salary: Decimal,
    /// Sum of all consumed incentives.
    pub total_incentives: Decimal,
    /// Sum of all consumed deductions.
    pub total_deductions: Decimal,
    /// `base_salary + total_incentives - total_deductions`.
    pub final_salary: Decimal,
    /// Lifecycle status.
    pub status: PayrollStatus,
    /// Present iff `status` is rejected.
    pub rejection_reason: Option<String>,
    /// Consumed components.
    pub components_snapshot: ComponentSnapshot,
    /// When the result was first generated.
    pub created_at: DateTime<Utc>,
}

impl PayrollResult {
    /// A fresh pending result with zero totals.
    ///
    /// The id is assigned when the row is inserted.
    pub fn open(batch_id: Uuid, employee: &Employee, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            batch_id,
            employee_id: employee.employee_id.clone(),
            base_salary: employee.base_salary,
            total_incentives: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            final_salary: employee.base_salary,
            status: PayrollStatus::Pending,
            rejection_reason: None,
            components_snapshot: ComponentSnapshot::default(),
            created_at,
        }
    }

    /// Adds consumed components to the totals and the snapshot, then
    /// recomputes `final_salary` against `base_salary`.
    ///
    /// On overflow the result is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AmountOverflow`] if any total leaves the
    /// representable range.
    pub fn absorb(&mut self, base_salary: Decimal, components: &[Component]) -> EngineResult<()> {
        let overflow = || EngineError::AmountOverflow {
            employee_id: self.employee_id.clone(),
        };

        let mut total_incentives = self.total_incentives;
        let mut total_deductions = self.total_deductions;
        for component in components {
            let total = match component.kind {
                ComponentKind::Incentive => &mut total_incentives,
                ComponentKind::Deduction => &mut total_deductions,
            };
            *total = total.checked_add(component.amount).ok_or_else(overflow)?;
        }
        let final_salary = base_salary
            .checked_add(total_incentives)
            .and_then(|sum| sum.checked_sub(total_deductions))
            .ok_or_else(overflow)?;

        self.base_salary = base_salary;
        self.total_incentives = total_incentives;
        self.total_deductions = total_deductions;
        self.final_salary = final_salary;
        for component in components {
            self.components_snapshot.record(component);
        }
        Ok(())
    }

    /// Puts a decided result back up for review.
    ///
    /// Returns true if the status changed.
    pub fn reopen(&mut self) -> bool {
        if !self.status.is_terminal() {
            return false;
        }
        self.status = PayrollStatus::Pending;
        self.rejection_reason = None;
        true
    }
}

impl<'r> FromRow<'r, SqliteRow> for PayrollResult {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            batch_id: row.try_get("batch_id")?,
            employee_id: row.try_get("employee_id")?,
            base_salary: row.try_get::<Text<Decimal>, _>("base_salary")?.0,
            total_incentives: row.try_get::<Text<Decimal>, _>("total_incentives")?.0,
            total_deductions: row.try_get::<Text<Decimal>, _>("total_deductions")?.0,
            final_salary: row.try_get::<Text<Decimal>, _>("final_salary")?.0,
            status: row.try_get("status")?,
            rejection_reason: row.try_get("rejection_reason")?,
            components_snapshot: row
                .try_get::<Json<ComponentSnapshot>, _>("components_snapshot")?
                .0,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A payroll result joined with its employee record, as listed on the
/// dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollResultDetail {
    /// The result.
    #[serde(flatten)]
    pub result: PayrollResult,
    /// The employee the result is for.
    pub employee: Employee,
}

/// The open payroll cycle.
///
/// Exactly one batch is open at a time. Archiving closes it and opens a new
/// one with a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PayrollBatch {
    /// Batch identifier.
    pub id: Uuid,
    /// When the batch was opened.
    pub opened_at: DateTime<Utc>,
}

impl PayrollBatch {
    /// A new batch with a fresh id.
    pub fn open(opened_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            opened_at,
        }
    }
}
