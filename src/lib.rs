//! Student record conversion pipeline.
//!
//! Converts student records between three representations: a generated
//! `.xlsx` spreadsheet, an unquoted CSV file, and a SQLite table. Each hop
//! applies a score-adjustment transform, and long-running operations report
//! through a concurrent progress registry. The `ipc` module exposes the
//! operations over the daemon's line-delimited JSON protocol.

pub mod convert;
pub mod db;
pub mod error;
pub mod generate;
pub mod ipc;
pub mod job;
pub mod load;
pub mod progress;
pub mod record;
pub mod sheet;

pub use error::{PipelineError, Result};
