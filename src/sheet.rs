use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::generate::RecordGenerator;
use crate::progress::ProgressSink;
use crate::record::{StudentRecord, COLUMNS};

pub const WORKSHEET_NAME: &str = "Students";

/// Progress registry update cadence, in records.
pub const PROGRESS_UPDATE_INTERVAL: u64 = 1_000;
/// Log-line cadence, in records.
const PROGRESS_LOG_INTERVAL: u64 = 50_000;

/// Where an operation left its output and how much of it there is.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub file_name: String,
    pub records_written: u64,
}

/// Generates `count` synthetic records and streams them into an `.xlsx` file
/// under `data_dir`.
///
/// The worksheet is written in constant-memory mode, so resident state stays
/// bounded no matter how large `count` is. Progress is reported through
/// `progress` every `PROGRESS_UPDATE_INTERVAL` records; on failure the
/// operation is marked FAILED and the error propagates. Partially written
/// output is left on disk.
pub fn generate_sheet(
    data_dir: &Path,
    count: u64,
    file_name: Option<&str>,
    progress: Option<ProgressSink<'_>>,
) -> Result<FileOutcome> {
    info!(count, "starting sheet generation");
    std::fs::create_dir_all(data_dir)?;

    let file_name = resolve_file_name(data_dir, count, file_name);
    let path = data_dir.join(&file_name);
    info!(path = %path.display(), "generating sheet");

    if let Some(sink) = progress {
        sink.start(count);
    }

    let started = Instant::now();
    let records = RecordGenerator::new().take(count as usize);
    match write_records(&path, records, count, progress) {
        Ok(records_written) => {
            let elapsed = started.elapsed().as_millis();
            info!(
                records_written,
                elapsed_ms = elapsed as u64,
                file = %file_name,
                "sheet generation completed"
            );
            if let Some(sink) = progress {
                sink.complete(&format!(
                    "Completed: {} records generated in {} ms",
                    records_written, elapsed
                ));
            }
            Ok(FileOutcome {
                path,
                file_name,
                records_written,
            })
        }
        Err(e) => {
            if let Some(sink) = progress {
                sink.fail(&format!("Generation failed: {}", e));
            }
            Err(e)
        }
    }
}

/// Streams a finite record sequence into the worksheet at `path`.
///
/// Rows are handed to the workbook one at a time and flushed to disk as
/// writing advances; only the current row is resident. Returns the number of
/// rows written (the header row is not counted).
pub fn write_records<I>(
    path: &Path,
    records: I,
    total: u64,
    progress: Option<ProgressSink<'_>>,
) -> Result<u64>
where
    I: IntoIterator<Item = StudentRecord>,
{
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet_with_constant_memory();
    worksheet
        .set_name(WORKSHEET_NAME)
        .map_err(|e| PipelineError::Sheet(e.to_string()))?;

    for (col, title) in COLUMNS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *title)
            .map_err(|e| PipelineError::Sheet(e.to_string()))?;
    }

    let started = Instant::now();
    let mut written: u64 = 0;
    for record in records {
        let row = (written + 1) as u32;
        worksheet
            .write_number(row, 0, record.student_id as f64)
            .and_then(|ws| ws.write_string(row, 1, &record.first_name))
            .and_then(|ws| ws.write_string(row, 2, &record.last_name))
            .and_then(|ws| {
                ws.write_string(row, 3, record.date_of_birth.format("%Y-%m-%d").to_string())
            })
            .and_then(|ws| ws.write_string(row, 4, &record.class_name))
            .and_then(|ws| ws.write_number(row, 5, record.score))
            .map_err(|e| PipelineError::Sheet(e.to_string()))?;
        written += 1;

        if written % PROGRESS_UPDATE_INTERVAL == 0 {
            if let Some(sink) = progress {
                sink.update(written, &format!("Generated {} of {} records", written, total));
            }
        }
        if written % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                rows = written,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sheet write progress"
            );
        }
    }

    workbook
        .save(path)
        .map_err(|e| PipelineError::Sheet(e.to_string()))?;
    Ok(written)
}

/// Picks an output file name: synthesized from the record count when none is
/// supplied, suffixed with a timestamp when the supplied name already exists.
/// Best-effort uniqueness only; there is no atomic reservation of the name.
fn resolve_file_name(data_dir: &Path, count: u64, file_name: Option<&str>) -> String {
    let millis = unix_millis();
    match file_name.map(str::trim).filter(|s| !s.is_empty()) {
        None => format!("students-{}-{}.xlsx", count, millis),
        Some(name) => {
            let mut name = name.to_string();
            if !name.ends_with(".xlsx") {
                name.push_str(".xlsx");
            }
            if data_dir.join(&name).exists() {
                let base = name.trim_end_matches(".xlsx");
                name = format!("{}-{}.xlsx", base, millis);
            }
            name
        }
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
