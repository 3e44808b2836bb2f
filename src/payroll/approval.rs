//! Approval and rejection of payroll results.
//!
//! A pending result moves to approved or rejected. Lookups only see
//! pending results in the open batch, so acting on a decided result reports
//! not-found rather than a conflict.

use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{PayrollResult, PayrollStatus};
use crate::store::PayrollStore;

/// Longest rejection reason accepted.
pub const MAX_REJECTION_REASON_LEN: usize = 500;

async fn pending_result(conn: &mut SqliteConnection, result_id: i64) -> EngineResult<PayrollResult> {
    sqlx::query_as(
        "SELECT * FROM payroll_results
         WHERE id = ? AND status = ?
           AND batch_id = (SELECT id FROM payroll_batches WHERE closed_at IS NULL)",
    )
    .bind(result_id)
    .bind(PayrollStatus::Pending)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| EngineError::not_found("Payroll result", result_id))
}

async fn record_decision(conn: &mut SqliteConnection, result: &PayrollResult) -> EngineResult<()> {
    sqlx::query("UPDATE payroll_results SET status = ?, rejection_reason = ? WHERE id = ?")
        .bind(result.status)
        .bind(&result.rejection_reason)
        .bind(result.id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Checks a rejection reason and returns it trimmed.
///
/// # Example
///
/// ```
/// use payroll_engine::payroll::validate_rejection_reason;
///
/// assert_eq!(validate_rejection_reason("  Wrong bank details ").unwrap(), "Wrong bank details");
/// assert!(validate_rejection_reason("   ").is_err());
/// ```
pub fn validate_rejection_reason(reason: &str) -> EngineResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::validation(
            "reason",
            "This field may not be blank.",
        ));
    }
    if reason.chars().count() > MAX_REJECTION_REASON_LEN {
        return Err(EngineError::validation(
            "reason",
            format!(
                "Ensure this field has no more than {} characters.",
                MAX_REJECTION_REASON_LEN
            ),
        ));
    }
    Ok(reason.to_string())
}

/// Approves a pending result.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if no pending result has this id.
pub async fn approve(store: &PayrollStore, result_id: i64) -> EngineResult<PayrollResult> {
    let mut tx = store.begin().await?;
    let mut result = pending_result(&mut tx, result_id).await?;
    result.status = PayrollStatus::Approved;
    record_decision(&mut tx, &result).await?;
    tx.commit().await?;

    info!(result_id, employee_id = %result.employee_id, "Payroll approved");
    Ok(result)
}

/// Rejects a pending result with a reason.
///
/// The pending lookup happens first, so an unknown or decided result is
/// reported as not-found even when the reason is also invalid.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if no pending result has this id, and
/// [`EngineError::Validation`] if the reason is blank or longer than
/// [`MAX_REJECTION_REASON_LEN`] characters.
pub async fn reject(store: &PayrollStore, result_id: i64, reason: &str) -> EngineResult<PayrollResult> {
    let mut tx = store.begin().await?;
    let mut result = pending_result(&mut tx, result_id).await?;
    result.rejection_reason = Some(validate_rejection_reason(reason)?);
    result.status = PayrollStatus::Rejected;
    record_decision(&mut tx, &result).await?;
    tx.commit().await?;

    info!(result_id, employee_id = %result.employee_id, "Payroll rejected");
    Ok(result)
}
