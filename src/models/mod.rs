//! Core data models for the Payroll Engine.
//!
//! This module contains all the domain models used throughout the engine.

mod component;
mod employee;
mod payroll_result;
mod payroll_run;

pub use component::{Component, ComponentKind, NewComponent};
pub use employee::Employee;
pub use payroll_result::{
    ComponentSnapshot, PayrollBatch, PayrollResult, PayrollResultDetail, PayrollStatus,
    SnapshotEntry,
};
pub use payroll_run::{ArchivedPayrollResult, PayrollRun};
