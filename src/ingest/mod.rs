//! Spreadsheet ingestion for the Payroll Engine.
//!
//! This module turns uploaded files into data the payroll layer can use:
//! uploads are buffered to disk, read as sheets of string cells, and amount
//! cells are parsed into exact decimals.

mod decimal;
mod spreadsheet;
mod uploads;

pub use decimal::{
    parse_decimal, parse_optional_decimal, round_money, validate_money, MoneyError,
    MONEY_DECIMAL_PLACES, MONEY_MAX_DIGITS,
};
pub use spreadsheet::{read_path, read_sheet, Sheet, SheetRow};
pub use uploads::{StoredUpload, UploadStore};
