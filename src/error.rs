//! Error types for sheetlife

use thiserror::Error;

/// Failures of the workbook container codec.
///
/// Decoding persisted workbooks never surfaces these (see
/// [`crate::loader::parse_habit_workbook`]); they reach callers only from
/// encoding and from explicit imports.
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Xlsx write error: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Xlsx read error: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the shared key-value namespace and its durable medium.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Validation outcome a caller checks before dispatching a habit action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("Habit name cannot be empty")]
    EmptyName,

    #[error("Unknown direction: {0}")]
    UnknownDirection(String),
}
