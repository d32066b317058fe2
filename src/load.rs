use std::io;
use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rusqlite::{params_from_iter, types::Value, Connection};
use tracing::{debug, error, info, warn};

use crate::db;
use crate::error::{PipelineError, Result};
use crate::progress::ProgressSink;
use crate::record::StudentRecord;
use crate::sheet::PROGRESS_UPDATE_INTERVAL;

/// Delta applied when storing a raw generated score.
pub const STORE_SCORE_DELTA: i32 = 5;

/// Candidate records accumulated before a bulk write.
pub const BATCH_SIZE: usize = 5_000;

/// Rows per multi-row INSERT statement. 7 bind variables per row; kept well
/// under SQLite's bind variable limit.
const INSERT_CHUNK_ROWS: usize = 450;

const PROGRESS_LOG_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub records_inserted: u64,
}

/// Loads a six-column CSV file into the `students` table.
///
/// Rows are parsed and trimmed field-by-field; a row with fewer than six
/// fields or any uncoercible field is logged and skipped. Surviving records
/// have their stored score reconstructed by `reconstruct_score`, are
/// deduplicated against existing `student_id`s, and are committed in
/// `BATCH_SIZE` batches with upsert-or-skip semantics. A failed bulk write
/// falls back to per-record writes; if both fail the batch contributes zero
/// inserts and the run continues.
pub fn load_csv(
    conn: &mut Connection,
    source: &Path,
    progress: Option<ProgressSink<'_>>,
) -> Result<LoadOutcome> {
    info!(source = %source.display(), "starting csv to store load");
    if !source.exists() {
        return Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("csv file not found: {}", source.display()),
        )));
    }

    if let Some(sink) = progress {
        sink.start(0);
    }
    let started = Instant::now();
    match load_inner(conn, source, progress) {
        Ok(outcome) => {
            if let Some(sink) = progress {
                sink.complete(&format!(
                    "Completed: {} records inserted in {} ms",
                    outcome.records_inserted,
                    started.elapsed().as_millis()
                ));
            }
            Ok(outcome)
        }
        Err(e) => {
            if let Some(sink) = progress {
                sink.fail(&format!("Load failed: {}", e));
            }
            Err(e)
        }
    }
}

fn load_inner(
    conn: &mut Connection,
    source: &Path,
    progress: Option<ProgressSink<'_>>,
) -> Result<LoadOutcome> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(source)?;
    let mut rows = reader.records();

    let header = rows
        .next()
        .ok_or_else(|| PipelineError::Format("csv file is empty or has no header".to_string()))??;
    info!(header = %header.iter().collect::<Vec<_>>().join(", "), "csv header");

    let started = Instant::now();
    let mut processed: u64 = 0;
    let mut inserted: u64 = 0;
    let mut skipped: u64 = 0;
    let mut batch: Vec<StudentRecord> = Vec::with_capacity(BATCH_SIZE);

    for row in rows {
        let row = row?;
        processed += 1;

        match parse_csv_row(&row) {
            Some(mut record) => {
                record.score = reconstruct_score(record.score);
                if db::student_exists(conn, record.student_id)? {
                    skipped += 1;
                    debug!(student_id = record.student_id, "already stored, skipping");
                } else {
                    batch.push(record);
                    if batch.len() >= BATCH_SIZE {
                        inserted += flush_batch(conn, &batch);
                        batch.clear();
                    }
                }
            }
            None => {
                warn!(row = processed, "skipping malformed csv row");
                skipped += 1;
            }
        }

        if processed % PROGRESS_UPDATE_INTERVAL == 0 {
            if let Some(sink) = progress {
                sink.update(processed, &format!("Processed {} records", processed));
            }
        }
        if processed % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                processed,
                inserted,
                skipped,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "load progress"
            );
        }
    }

    if !batch.is_empty() {
        inserted += flush_batch(conn, &batch);
    }

    if let Some(sink) = progress {
        // Final count, so the completion snapshot carries the true total.
        sink.update(processed, &format!("Processed {} records", processed));
    }

    info!(
        processed,
        inserted,
        skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "csv to store load completed"
    );
    Ok(LoadOutcome {
        records_inserted: inserted,
    })
}

/// Parses one delimited row: six trimmed fields, integer id and score, ISO
/// date, non-empty names and class. Any failure rejects the whole row.
fn parse_csv_row(row: &csv::StringRecord) -> Option<StudentRecord> {
    if row.len() < 6 {
        warn!(fields = row.len(), "csv row too short, expected 6 fields");
        return None;
    }

    let student_id: i64 = row.get(0)?.trim().parse().ok()?;
    let first_name = row.get(1)?.trim().to_string();
    let last_name = row.get(2)?.trim().to_string();
    let date_of_birth = NaiveDate::parse_from_str(row.get(3)?.trim(), "%Y-%m-%d").ok()?;
    let class_name = row.get(4)?.trim().to_string();
    let score: i32 = row.get(5)?.trim().parse().ok()?;

    if first_name.is_empty() || last_name.is_empty() || class_name.is_empty() {
        warn!(student_id, "empty required fields in csv row");
        return None;
    }

    Some(StudentRecord {
        student_id,
        first_name,
        last_name,
        date_of_birth,
        class_name,
        score,
    })
}

/// Range-based provenance heuristic for incoming scores.
///
/// A CSV score may be a raw generated score (55..=75) or a sheet-converted
/// one (65..=85, +10 already applied). Converted scores are normalized by -5
/// (undo +10, apply the +5 storage delta); raw scores get +5. The bands
/// overlap: 60 and 70 both map to 65, which is the accepted behavior, not a
/// bug. Out-of-range values get the raw treatment with a warning.
pub fn reconstruct_score(csv_score: i32) -> i32 {
    if (65..=85).contains(&csv_score) {
        csv_score - 5
    } else if (55..=75).contains(&csv_score) {
        csv_score + STORE_SCORE_DELTA
    } else {
        warn!(score = csv_score, "score outside expected bands, treating as raw");
        csv_score + STORE_SCORE_DELTA
    }
}

/// Writes a batch, degrading from the bulk path to per-record writes and
/// finally to zero inserts. Failure is local to the batch.
fn flush_batch(conn: &mut Connection, batch: &[StudentRecord]) -> u64 {
    let created_at = Utc::now().to_rfc3339();
    match bulk_insert(conn, batch, &created_at) {
        Ok(n) => {
            debug!(inserted = n, batch = batch.len(), "batch flushed");
            n
        }
        Err(e) => {
            error!(error = %e, "bulk insert failed, falling back to per-record writes");
            match insert_individually(conn, batch, &created_at) {
                Ok(n) => {
                    debug!(inserted = n, "fallback insert succeeded");
                    n
                }
                Err(e) => {
                    error!(error = %e, "fallback insert also failed, batch dropped");
                    0
                }
            }
        }
    }
}

/// Fast path: multi-row `INSERT OR IGNORE` inside one transaction, chunked to
/// respect the bind variable limit. Returns rows actually inserted (collisions
/// with existing keys are silently ignored by the store).
fn bulk_insert(conn: &mut Connection, batch: &[StudentRecord], created_at: &str) -> Result<u64> {
    let tx = conn.transaction()?;
    let mut inserted: u64 = 0;

    for chunk in batch.chunks(INSERT_CHUNK_ROWS) {
        let mut sql = String::from(
            "INSERT OR IGNORE INTO students \
             (student_id, first_name, last_name, dob, class_name, score, created_at) VALUES ",
        );
        let mut values: Vec<Value> = Vec::with_capacity(chunk.len() * 7);
        for (i, record) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            sql.push_str("(?,?,?,?,?,?,?)");
            values.push(Value::Integer(record.student_id));
            values.push(Value::Text(record.first_name.clone()));
            values.push(Value::Text(record.last_name.clone()));
            values.push(Value::Text(
                record.date_of_birth.format("%Y-%m-%d").to_string(),
            ));
            values.push(Value::Text(record.class_name.clone()));
            values.push(Value::Integer(record.score as i64));
            values.push(Value::Text(created_at.to_string()));
        }
        inserted += tx.execute(&sql, params_from_iter(values))? as u64;
    }

    tx.commit()?;
    Ok(inserted)
}

/// Fallback path: one prepared `INSERT OR IGNORE` per record.
fn insert_individually(
    conn: &mut Connection,
    batch: &[StudentRecord],
    created_at: &str,
) -> Result<u64> {
    let tx = conn.transaction()?;
    let mut inserted: u64 = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO students \
             (student_id, first_name, last_name, dob, class_name, score, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for record in batch {
            inserted += stmt.execute((
                record.student_id,
                &record.first_name,
                &record.last_name,
                record.date_of_birth.format("%Y-%m-%d").to_string(),
                &record.class_name,
                record.score,
                created_at,
            ))? as u64;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bands_reconstruct_as_documented() {
        // Converted band: undo +10, apply +5.
        assert_eq!(reconstruct_score(70), 65);
        assert_eq!(reconstruct_score(85), 80);
        // Raw band: apply +5. 60 and 70 both land on 65 (accepted overlap).
        assert_eq!(reconstruct_score(60), 65);
        assert_eq!(reconstruct_score(55), 60);
        // Outside both bands: raw treatment.
        assert_eq!(reconstruct_score(40), 45);
        assert_eq!(reconstruct_score(99), 104);
    }

    #[test]
    fn short_and_unparseable_rows_are_rejected() {
        let short = csv::StringRecord::from(vec!["1", "Jane", "Doe", "2004-01-01"]);
        assert!(parse_csv_row(&short).is_none());

        let bad_date =
            csv::StringRecord::from(vec!["1", "Jane", "Doe", "01/01/2004", "Class1", "60"]);
        assert!(parse_csv_row(&bad_date).is_none());

        let bad_score =
            csv::StringRecord::from(vec!["1", "Jane", "Doe", "2004-01-01", "Class1", "sixty"]);
        assert!(parse_csv_row(&bad_score).is_none());

        let blank_name =
            csv::StringRecord::from(vec!["1", " ", "Doe", "2004-01-01", "Class1", "60"]);
        assert!(parse_csv_row(&blank_name).is_none());

        let good =
            csv::StringRecord::from(vec![" 1 ", " Jane ", "Doe", "2004-01-01", "Class1", " 60 "]);
        let record = parse_csv_row(&good).unwrap();
        assert_eq!(record.student_id, 1);
        assert_eq!(record.first_name, "Jane");
        assert_eq!(record.score, 60);
    }
}
