//! Component ledger ingestion.
//!
//! Incentive and deduction sheets are tolerant: a row naming an
//! unknown employee or carrying an unreadable amount is dropped, and a file
//! that cannot be read is skipped while the others are still processed.
//! Every drop is reported back in the [`IngestReport`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Text;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::ingest::{parse_decimal, read_path, round_money, validate_money, Sheet, StoredUpload};
use crate::models::{Component, ComponentKind, NewComponent};
use crate::store::PayrollStore;

use super::directory::EMPLOYEE_ID_COLUMN;

const AMOUNT_COLUMN: &str = "amount";
const REASON_COLUMN: &str = "reason";

/// Longest reason accepted on a manual entry.
pub const MAX_MANUAL_REASON_LEN: usize = 255;

/// `source_file` recorded for manually entered components.
pub const MANUAL_SOURCE: &str = "manual entry";

/// A sheet ready for ingestion, or the error that prevented reading it.
#[derive(Debug)]
pub struct LoadedSheet {
    /// The stored name of the uploaded file.
    pub source_file: String,
    /// The parsed sheet.
    pub sheet: EngineResult<Sheet>,
}

impl From<&StoredUpload> for LoadedSheet {
    fn from(upload: &StoredUpload) -> Self {
        Self {
            source_file: upload.stored_name.clone(),
            sheet: read_path(&upload.path),
        }
    }
}

/// Why a row was left out of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The `employee_id` cell was blank.
    MissingEmployeeId,
    /// The employee is not in the directory.
    UnknownEmployee,
    /// The `amount` cell was blank.
    MissingAmount,
    /// The `amount` cell was not a number.
    UnparseableAmount,
    /// The amount does not fit in ten digits once rounded to cents.
    AmountOutOfRange,
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    /// The row became a ledger component.
    Accepted,
    /// The row was dropped.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
}

/// Outcome of a single data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// The file the row came from.
    pub source_file: String,
    /// 1-based line in that file.
    pub line: usize,
    /// The employee id cell, if present.
    pub employee_id: Option<String>,
    /// Accepted or skipped.
    #[serde(flatten)]
    pub status: RowStatus,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// The file was read and its rows evaluated.
    Processed {
        /// Rows accepted from this file.
        accepted: usize,
    },
    /// The file was ignored as a whole.
    Skipped {
        /// Why.
        message: String,
    },
}

/// Outcome of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// The stored file name.
    pub source_file: String,
    /// Processed or skipped.
    #[serde(flatten)]
    pub status: FileStatus,
}

/// The full account of one component upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Incentive or deduction.
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// Components added to the ledger.
    pub accepted: usize,
    /// Per-file outcomes.
    pub files: Vec<FileOutcome>,
    /// Per-row outcomes.
    pub rows: Vec<RowOutcome>,
}

impl IngestReport {
    /// Number of skipped rows.
    pub fn skipped_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row.status, RowStatus::Skipped { .. }))
            .count()
    }
}

/// Adds incentive or deduction rows from uploaded sheets to the ledger.
///
/// Each sheet needs `employee_id` and `amount` columns; `reason` is
/// optional. Amounts are rounded to cents. Accepted rows from all files are
/// inserted together in one transaction.
pub async fn ingest_components(
    store: &PayrollStore,
    files: Vec<LoadedSheet>,
    kind: ComponentKind,
) -> EngineResult<IngestReport> {
    let mut tx = store.begin().await?;
    let known: BTreeSet<String> = sqlx::query_scalar("SELECT employee_id FROM employees")
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

    let now = Utc::now();
    let mut report = IngestReport {
        kind,
        accepted: 0,
        files: Vec::with_capacity(files.len()),
        rows: Vec::new(),
    };
    let mut pending: Vec<NewComponent> = Vec::new();

    for LoadedSheet { source_file, sheet } in files {
        let sheet = match sheet {
            Ok(sheet) => sheet,
            Err(err) => {
                warn!(file = %source_file, error = %err, "Skipping unreadable component file");
                report.files.push(FileOutcome {
                    source_file,
                    status: FileStatus::Skipped {
                        message: err.to_string(),
                    },
                });
                continue;
            }
        };

        if !(sheet.has_column(EMPLOYEE_ID_COLUMN) && sheet.has_column(AMOUNT_COLUMN)) {
            warn!(file = %source_file, "Skipping component file without employee_id/amount columns");
            report.files.push(FileOutcome {
                source_file,
                status: FileStatus::Skipped {
                    message: format!(
                        "The sheet must have '{}' and '{}' columns.",
                        EMPLOYEE_ID_COLUMN, AMOUNT_COLUMN
                    ),
                },
            });
            continue;
        }

        let mut accepted_in_file = 0;
        for row in sheet.rows() {
            let employee_id = row.get(EMPLOYEE_ID_COLUMN).map(str::to_string);
            let amount = row.get(AMOUNT_COLUMN);

            let outcome = match (&employee_id, amount) {
                (None, _) => Err(SkipReason::MissingEmployeeId),
                (Some(id), _) if !known.contains(id) => Err(SkipReason::UnknownEmployee),
                (Some(_), None) => Err(SkipReason::MissingAmount),
                (Some(id), Some(raw)) => parse_decimal(raw)
                    .ok_or(SkipReason::UnparseableAmount)
                    .and_then(|amount| round_money(amount).ok_or(SkipReason::AmountOutOfRange))
                    .map(|amount| (id.clone(), amount)),
            };

            let status = match outcome {
                Ok((employee_id, amount)) => {
                    pending.push(NewComponent {
                        employee_id,
                        kind,
                        amount,
                        reason: row.get(REASON_COLUMN).map(str::to_string),
                        source_file: Some(source_file.clone()),
                        attachment: None,
                    });
                    accepted_in_file += 1;
                    RowStatus::Accepted
                }
                Err(reason) => {
                    debug!(file = %source_file, line = row.line(), ?reason, "Skipping component row");
                    RowStatus::Skipped { reason }
                }
            };

            report.rows.push(RowOutcome {
                source_file: source_file.clone(),
                line: row.line(),
                employee_id,
                status,
            });
        }

        report.files.push(FileOutcome {
            source_file,
            status: FileStatus::Processed {
                accepted: accepted_in_file,
            },
        });
    }

    report.accepted = pending.len();
    for component in &pending {
        insert_component(&mut tx, component, now).await?;
    }
    tx.commit().await?;

    info!(
        kind = %kind,
        accepted = report.accepted,
        skipped = report.skipped_rows(),
        files = report.files.len(),
        "Component upload ingested"
    );
    Ok(report)
}

async fn insert_component(
    conn: &mut SqliteConnection,
    component: &NewComponent,
    now: DateTime<Utc>,
) -> EngineResult<Component> {
    let inserted = sqlx::query_as(
        "INSERT INTO components
             (employee_id, kind, amount, reason, source_file, attachment, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(&component.employee_id)
    .bind(component.kind)
    .bind(Text(component.amount))
    .bind(&component.reason)
    .bind(&component.source_file)
    .bind(&component.attachment)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(inserted)
}

/// A manually entered incentive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualComponent {
    /// The employee the incentive is for.
    #[serde(rename = "employee")]
    pub employee_id: String,
    /// The amount, at most ten digits with two decimal places.
    pub amount: Decimal,
    /// Optional reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Stored name of the supporting document, if one was uploaded.
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Adds a single incentive directly to the ledger.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] if the employee does not exist, the
/// amount has more than two decimal places or ten digits, or the reason is
/// longer than [`MAX_MANUAL_REASON_LEN`] characters.
pub async fn manual_add(store: &PayrollStore, entry: ManualComponent) -> EngineResult<Component> {
    let amount = validate_money(entry.amount)
        .map_err(|err| EngineError::validation("amount", err.to_string()))?;

    let reason = entry
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason
        .as_deref()
        .is_some_and(|r| r.chars().count() > MAX_MANUAL_REASON_LEN)
    {
        return Err(EngineError::validation(
            "reason",
            format!(
                "Ensure this field has no more than {} characters.",
                MAX_MANUAL_REASON_LEN
            ),
        ));
    }

    let employee_id = entry.employee_id.trim().to_string();
    let attachment = entry.attachment.filter(|a| !a.trim().is_empty());

    let mut tx = store.begin().await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM employees WHERE employee_id = ?)")
            .bind(&employee_id)
            .fetch_one(&mut *tx)
            .await?;
    if !exists {
        return Err(EngineError::validation(
            "employee",
            format!("Employee '{}' does not exist.", employee_id),
        ));
    }

    let component = insert_component(
        &mut tx,
        &NewComponent {
            employee_id,
            kind: ComponentKind::Incentive,
            amount,
            reason,
            source_file: Some(MANUAL_SOURCE.to_string()),
            attachment,
        },
        Utc::now(),
    )
    .await?;
    tx.commit().await?;

    info!(
        employee_id = %component.employee_id,
        amount = %component.amount,
        "Manual incentive added"
    );
    Ok(component)
}

/// Returns every component waiting for the next generation, oldest first.
pub async fn list_components(store: &PayrollStore) -> EngineResult<Vec<Component>> {
    let components = sqlx::query_as("SELECT * FROM components ORDER BY id")
        .fetch_all(store.pool())
        .await?;
    Ok(components)
}
