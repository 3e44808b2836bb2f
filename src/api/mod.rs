//! HTTP API module for the Payroll Engine.
//!
//! This module provides the REST endpoints for uploading employee and
//! component sheets, generating and deciding payroll, and browsing the
//! archived history.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{ArchiveRequest, RejectRequest, ResultsQuery};
pub use response::{ApiError, ApiErrorResponse, HealthResponse, MessageResponse};
pub use state::AppState;
