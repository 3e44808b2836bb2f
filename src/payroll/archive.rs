//! Archival of payroll cycles into history.
//!
//! Archiving copies every result of the open batch, whatever its status,
//! into a new [`PayrollRun`], closes the batch and opens an empty one. Runs
//! are immutable afterwards and can only be deleted as a whole; their rows
//! go with them through `ON DELETE CASCADE`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{ArchivedPayrollResult, PayrollBatch, PayrollRun};
use crate::store::{self, PayrollStore};

/// The run created by an archive and how many results it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    /// The new run.
    pub run: PayrollRun,
    /// Number of results copied into it.
    pub archived_results: usize,
}

/// Archives the open batch and starts a new cycle.
///
/// A blank `name` is treated as no name. Each archived row keeps the base
/// salary its result was generated with.
///
/// # Errors
///
/// Returns [`EngineError::NothingToArchive`] if the open batch is empty.
pub async fn archive_current_run(
    store: &PayrollStore,
    name: Option<&str>,
) -> EngineResult<ArchiveOutcome> {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

    let mut tx = store.begin().await?;
    let closed = store::open_batch(&mut tx).await?;
    let open_results: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payroll_results WHERE batch_id = ?")
            .bind(closed.id)
            .fetch_one(&mut *tx)
            .await?;
    if open_results == 0 {
        return Err(EngineError::NothingToArchive);
    }
    let now = Utc::now();

    let run: PayrollRun = sqlx::query_as(
        "INSERT INTO payroll_runs (run_timestamp, name, batch_id)
         VALUES (?, ?, ?)
         RETURNING *",
    )
    .bind(now)
    .bind(&name)
    .bind(closed.id)
    .fetch_one(&mut *tx)
    .await?;

    let archived = sqlx::query(
        "INSERT INTO archived_payroll_results
             (run_id, employee_id, employee_name, base_salary, total_incentives,
              total_deductions, final_salary, status, rejection_reason, components_snapshot)
         SELECT ?, r.employee_id, e.name, r.base_salary, r.total_incentives,
                r.total_deductions, r.final_salary, r.status, r.rejection_reason,
                r.components_snapshot
         FROM payroll_results r
         JOIN employees e ON e.employee_id = r.employee_id
         WHERE r.batch_id = ?
         ORDER BY r.employee_id",
    )
    .bind(run.id)
    .bind(closed.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM payroll_results WHERE batch_id = ?")
        .bind(closed.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE payroll_batches SET closed_at = ? WHERE id = ?")
        .bind(now)
        .bind(closed.id)
        .execute(&mut *tx)
        .await?;
    store::insert_batch(&mut tx, &PayrollBatch::open(now)).await?;
    tx.commit().await?;

    let outcome = ArchiveOutcome {
        run,
        archived_results: archived as usize,
    };
    info!(
        run_id = outcome.run.id,
        batch_id = %outcome.run.batch_id,
        archived = outcome.archived_results,
        "Payroll run archived"
    );
    Ok(outcome)
}

/// Deletes a run and all of its archived results.
///
/// Returns the number of archived results removed.
pub async fn delete_run(store: &PayrollStore, run_id: i64) -> EngineResult<usize> {
    let mut tx = store.begin().await?;
    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM archived_payroll_results WHERE run_id = ?")
            .bind(run_id)
            .fetch_one(&mut *tx)
            .await?;

    let deleted = sqlx::query("DELETE FROM payroll_runs WHERE id = ?")
        .bind(run_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(EngineError::not_found("Payroll run", run_id));
    }
    tx.commit().await?;

    let removed = rows as usize;
    info!(run_id, removed, "Payroll run deleted");
    Ok(removed)
}

/// Lists runs, newest first.
pub async fn list_runs(store: &PayrollStore) -> EngineResult<Vec<PayrollRun>> {
    let runs = sqlx::query_as("SELECT * FROM payroll_runs ORDER BY run_timestamp DESC, id DESC")
        .fetch_all(store.pool())
        .await?;
    Ok(runs)
}

/// Lists the archived results of one run, ordered by employee id.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if the run does not exist.
pub async fn list_archived_results(
    store: &PayrollStore,
    run_id: i64,
) -> EngineResult<Vec<ArchivedPayrollResult>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payroll_runs WHERE id = ?)")
        .bind(run_id)
        .fetch_one(store.pool())
        .await?;
    if !exists {
        return Err(EngineError::not_found("Payroll run", run_id));
    }

    let rows = sqlx::query_as(
        "SELECT * FROM archived_payroll_results WHERE run_id = ? ORDER BY employee_id, id",
    )
    .bind(run_id)
    .fetch_all(store.pool())
    .await?;
    Ok(rows)
}
