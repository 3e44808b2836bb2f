//! Payroll lifecycle for the Payroll Engine.
//!
//! This module contains the employee directory, the component ledger,
//! payroll generation, the approval state machine and archival into
//! history. Every mutating operation runs as one store transaction.

mod aggregator;
mod approval;
mod archive;
mod directory;
mod ledger;

pub use aggregator::{generate_or_update, list_results, GenerationSummary, ResultFilter};
pub use approval::{approve, reject, validate_rejection_reason, MAX_REJECTION_REASON_LEN};
pub use archive::{
    archive_current_run, delete_run, list_archived_results, list_runs, ArchiveOutcome,
};
pub use directory::{list_employees, upsert_from_sheet, UpsertSummary, EMPLOYEE_ID_COLUMN};
pub use ledger::{
    ingest_components, list_components, manual_add, FileOutcome, FileStatus, IngestReport,
    LoadedSheet, ManualComponent, RowOutcome, RowStatus, SkipReason, MANUAL_SOURCE,
    MAX_MANUAL_REASON_LEN,
};
