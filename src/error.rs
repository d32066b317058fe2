use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for the conversion pipeline.
///
/// Row-scoped input problems (short rows, unparseable cells) are never
/// represented here; those are logged and skipped at the call site. Only
/// operation-fatal conditions become errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook-level read or write failure.
    #[error("spreadsheet error: {0}")]
    Sheet(String),

    /// Structurally invalid input, e.g. a CSV file with no header row.
    #[error("invalid input: {0}")]
    Format(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}
