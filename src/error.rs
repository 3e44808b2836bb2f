//! Error types for the Payroll Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while ingesting spreadsheets,
//! generating payroll and moving results through their lifecycle.

use thiserror::Error;

/// The main error type for the Payroll Engine.
///
/// All operations in the engine return this error type, making it easy
/// to handle errors consistently throughout the application.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::MissingColumn {
///     column: "employee_id".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "The uploaded sheet must have an 'employee_id' column."
/// );
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A request field failed validation.
    #[error("Invalid field '{field}': {message}")]
    Validation {
        /// The field that was invalid.
        field: String,
        /// A description of what made the field invalid.
        message: String,
    },

    /// An uploaded sheet lacks a required column.
    #[error("The uploaded sheet must have an '{column}' column.")]
    MissingColumn {
        /// The name of the missing column.
        column: String,
    },

    /// No file was attached to an upload request.
    #[error("No {what} file provided.")]
    MissingFile {
        /// Which kind of file was expected.
        what: String,
    },

    /// The component type was not `incentive` or `deduction`.
    #[error("Invalid component type '{value}': expected 'incentive' or 'deduction'")]
    InvalidComponentKind {
        /// The rejected value.
        value: String,
    },

    /// The payroll status filter was not a known status.
    #[error("Invalid payroll status '{value}'")]
    InvalidStatus {
        /// The rejected value.
        value: String,
    },

    /// Archival was requested while the open batch holds no results.
    #[error("There are no payroll results to archive.")]
    NothingToArchive,

    /// A record could not be found (or is not in a state that exposes it).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record that was looked up.
        entity: &'static str,
        /// The identifier used for the lookup.
        id: String,
    },

    /// A spreadsheet could not be opened or parsed.
    #[error("Could not read file '{file}': {message}")]
    SpreadsheetRead {
        /// The file that failed to read.
        file: String,
        /// A description of the read error.
        message: String,
    },

    /// An uploaded file could not be written to the upload directory.
    #[error("Could not store upload at '{path}': {message}")]
    UploadStorage {
        /// The target path.
        path: String,
        /// A description of the I/O error.
        message: String,
    },

    /// Summing amounts for an employee left the representable range.
    #[error("Payroll amounts for employee '{employee_id}' are out of range")]
    AmountOverflow {
        /// The employee whose totals overflowed.
        employee_id: String,
    },

    /// The database rejected a query or could not be reached.
    #[error("Database error: {message}")]
    Database {
        /// A description of the database error.
        message: String,
    },
}

impl From<sqlx::Error> for EngineError {
    fn from(error: sqlx::Error) -> Self {
        EngineError::Database {
            message: error.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        EngineError::Database {
            message: format!("migration failed: {}", error),
        }
    }
}

impl EngineError {
    /// Shorthand for a [`EngineError::Validation`] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`EngineError::NotFound`] error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/payroll.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/payroll.yaml"
        );
    }

    #[test]
    fn test_validation_displays_field_and_message() {
        let error = EngineError::validation("reason", "This field may not be blank.");
        assert_eq!(
            error.to_string(),
            "Invalid field 'reason': This field may not be blank."
        );
    }

    #[test]
    fn test_not_found_displays_entity_and_id() {
        let error = EngineError::not_found("Payroll result", 42);
        assert_eq!(error.to_string(), "Payroll result not found: 42");
    }

    #[test]
    fn test_nothing_to_archive_message() {
        assert_eq!(
            EngineError::NothingToArchive.to_string(),
            "There are no payroll results to archive."
        );
    }

    #[test]
    fn test_spreadsheet_read_displays_file_and_message() {
        let error = EngineError::SpreadsheetRead {
            file: "bonus.xlsx".to_string(),
            message: "invalid zip header".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Could not read file 'bonus.xlsx': invalid zip header"
        );
    }

    #[test]
    fn test_invalid_component_kind_displays_value() {
        let error = EngineError::InvalidComponentKind {
            value: "bonus".to_string(),
        };
        assert!(error.to_string().contains("'bonus'"));
    }

    #[test]
    fn test_sqlx_error_converts_to_database_error() {
        let error: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, EngineError::Database { .. }));
        assert!(error.to_string().starts_with("Database error:"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_nothing_to_archive() -> EngineResult<()> {
            Err(EngineError::NothingToArchive)
        }

        fn propagates_error() -> EngineResult<()> {
            returns_nothing_to_archive()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
