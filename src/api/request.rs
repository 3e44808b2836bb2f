//! Request types for the Payroll Engine API.
//!
//! JSON bodies and query strings accepted by the payroll endpoints. The
//! manual-add body is [`ManualComponent`](crate::payroll::ManualComponent)
//! itself.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::models::PayrollStatus;
use crate::payroll::ResultFilter;

/// Request body for `POST /payroll/reject/{id}/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    /// Why the result is rejected. Required and non-blank.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for `POST /payroll/archive/`. The body itself is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRequest {
    /// Optional label for the new run.
    #[serde(default)]
    pub run_name: Option<String>,
}

/// Query string for `GET /payroll/results/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsQuery {
    /// `pending`, `approved` or `rejected`.
    #[serde(default)]
    pub status: Option<String>,
    /// Substring of the employee's name or id.
    #[serde(default)]
    pub search: Option<String>,
}

impl TryFrom<ResultsQuery> for ResultFilter {
    type Error = crate::error::EngineError;

    fn try_from(query: ResultsQuery) -> EngineResult<Self> {
        let status = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<PayrollStatus>)
            .transpose()?;
        let search = query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(ResultFilter { status, search })
    }
}
