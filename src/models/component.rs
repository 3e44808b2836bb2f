//! Ledger component model.
//!
//! Components are transient incentive or deduction line items that wait in
//! the ledger until the next payroll generation folds them into a result.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Text;
use sqlx::{FromRow, Row};

use crate::error::EngineError;

/// Whether a component adds to or subtracts from the salary.
///
/// # Example
///
/// ```
/// use payroll_engine::models::ComponentKind;
///
/// let kind: ComponentKind = "deduction".parse().unwrap();
/// assert_eq!(kind, ComponentKind::Deduction);
/// assert!("bonus".parse::<ComponentKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Added to the base salary.
    Incentive,
    /// Subtracted from the base salary.
    Deduction,
}

impl ComponentKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Incentive => "incentive",
            ComponentKind::Deduction => "deduction",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "incentive" => Ok(ComponentKind::Incentive),
            "deduction" => Ok(ComponentKind::Deduction),
            other => Err(EngineError::InvalidComponentKind {
                value: other.to_string(),
            }),
        }
    }
}

/// A single incentive or deduction awaiting consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Ledger identifier.
    pub id: i64,
    /// The employee this component belongs to.
    pub employee_id: String,
    /// Incentive or deduction.
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// The amount. Negative values are accepted as entered.
    pub amount: Decimal,
    /// Free-text reason from the sheet or manual entry.
    pub reason: Option<String>,
    /// Stored name of the file this record came from.
    pub source_file: Option<String>,
    /// Optional reference to a supporting document.
    pub attachment: Option<String>,
    /// When the component entered the ledger.
    pub created_at: DateTime<Utc>,
    /// When the component was last modified.
    pub updated_at: DateTime<Utc>,
}

/// The fields needed to place a component in the ledger.
///
/// The database assigns the id; timestamps are set on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComponent {
    /// The employee this component belongs to.
    pub employee_id: String,
    /// Incentive or deduction.
    pub kind: ComponentKind,
    /// The amount.
    pub amount: Decimal,
    /// Optional reason text.
    pub reason: Option<String>,
    /// Stored name of the originating file.
    pub source_file: Option<String>,
    /// Optional attachment reference.
    pub attachment: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for Component {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            employee_id: row.try_get("employee_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get::<Text<Decimal>, _>("amount")?.0,
            reason: row.try_get("reason")?,
            source_file: row.try_get("source_file")?,
            attachment: row.try_get("attachment")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
