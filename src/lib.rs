//! Payroll Engine
//!
//! This crate ingests employee master data and incentive/deduction sheets,
//! consolidates them into per-employee payroll results, takes each result
//! through approval or rejection, and archives completed cycles into an
//! immutable history.

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod payroll;
pub mod store;
