use std::io;
use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, DataType as _, Reader};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::progress::ProgressSink;
use crate::record::{StudentRecord, COLUMNS};
use crate::sheet::{FileOutcome, PROGRESS_UPDATE_INTERVAL};

/// Delta applied to every score when moving sheet -> text.
pub const SHEET_SCORE_DELTA: i32 = 10;

const PROGRESS_LOG_INTERVAL: u64 = 10_000;

/// Converts the first worksheet of an `.xlsx` file into an unquoted CSV file
/// written next to the source (`<stem>-processed.csv`).
///
/// The header row is skipped; every data row is coerced cell-by-cell into a
/// `StudentRecord`, its score incremented by `SHEET_SCORE_DELTA`, and written
/// out. Rows that fail to parse are logged and skipped; they never abort the
/// run and are not counted in `records_written`.
pub fn convert_sheet(source: &Path, progress: Option<ProgressSink<'_>>) -> Result<FileOutcome> {
    info!(source = %source.display(), "starting sheet to csv conversion");
    if !source.exists() {
        return Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("sheet file not found: {}", source.display()),
        )));
    }

    if let Some(sink) = progress {
        // Row count is unknown until the sheet is read; start with 0.
        sink.start(0);
    }

    let started = Instant::now();
    match convert_inner(source, progress) {
        Ok(outcome) => {
            let elapsed = started.elapsed().as_millis();
            info!(
                records = outcome.records_written,
                elapsed_ms = elapsed as u64,
                output = %outcome.path.display(),
                "conversion completed"
            );
            if let Some(sink) = progress {
                sink.complete(&format!(
                    "Completed: {} records converted in {} ms",
                    outcome.records_written, elapsed
                ));
            }
            Ok(outcome)
        }
        Err(e) => {
            if let Some(sink) = progress {
                sink.fail(&format!("Conversion failed: {}", e));
            }
            Err(e)
        }
    }
}

fn convert_inner(source: &Path, progress: Option<ProgressSink<'_>>) -> Result<FileOutcome> {
    let mut workbook =
        open_workbook_auto(source).map_err(|e| PipelineError::Sheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Format("workbook has no worksheets".to_string()))?
        .map_err(|e| PipelineError::Sheet(e.to_string()))?;

    let file_name = output_file_name(source);
    let path = source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&file_name);

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_path(&path)?;
    writer.write_record(COLUMNS)?;

    let mut records_written: u64 = 0;
    for (row_num, row) in range.rows().enumerate() {
        if row_num == 0 {
            continue; // header
        }
        let mut record = match parse_sheet_row(row) {
            Some(r) => r,
            None => {
                warn!(row = row_num, "skipping malformed sheet row");
                continue;
            }
        };
        record.score += SHEET_SCORE_DELTA;
        writer.write_record(record.csv_fields())?;
        records_written += 1;

        if records_written % PROGRESS_UPDATE_INTERVAL == 0 {
            if let Some(sink) = progress {
                sink.update(
                    records_written,
                    &format!("Converted {} records", records_written),
                );
            }
        }
        if records_written % PROGRESS_LOG_INTERVAL == 0 {
            info!(rows = records_written, "conversion progress");
        }
    }
    writer.flush()?;

    if let Some(sink) = progress {
        // Final count, so the completion snapshot carries the true total.
        sink.update(
            records_written,
            &format!("Converted {} records", records_written),
        );
    }

    Ok(FileOutcome {
        path,
        file_name,
        records_written,
    })
}

/// Per-column type coercion. Any missing or uncoercible cell rejects the row.
fn parse_sheet_row(row: &[Data]) -> Option<StudentRecord> {
    let student_id = cell_i64(row.get(0)?)?;
    let first_name = cell_string(row.get(1)?)?;
    let last_name = cell_string(row.get(2)?)?;
    let date_of_birth = cell_date(row.get(3)?)?;
    let class_name = cell_string(row.get(4)?)?;
    let score = cell_i64(row.get(5)?)?;

    Some(StudentRecord {
        student_id,
        first_name,
        last_name,
        date_of_birth,
        class_name,
        score: i32::try_from(score).ok()?,
    })
}

/// Numeric-or-string tolerant integer coercion.
fn cell_i64(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty text; numeric cells render as integer text.
fn cell_string(cell: &Data) -> Option<String> {
    let s = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => (*f as i64).to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Date-format tolerant: a date-formatted cell or an ISO-8601 string.
fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell.as_date(),
        _ => None,
    }
}

fn output_file_name(source: &Path) -> String {
    match source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
    {
        Some(stem) => format!("{}-processed.csv", stem),
        None => "processed-students.csv".to_string(),
    }
}
