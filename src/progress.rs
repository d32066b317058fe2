use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

/// Lifecycle of one tracked operation. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

#[derive(Debug)]
struct ProgressEntry {
    total_units: u64,
    processed_units: u64,
    started_at: Instant,
    status: OperationStatus,
    message: String,
}

/// Point-in-time view of an operation, with elapsed time computed at read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub operation_id: String,
    pub processed_units: u64,
    pub total_units: u64,
    pub elapsed_ms: u64,
    pub completed: bool,
    pub status: OperationStatus,
    pub message: String,
}

/// Concurrent map from operation id to progress state.
///
/// Discipline: the worker that called `start` is the sole writer for its key;
/// any number of pollers may call `get` concurrently. Entries are mutated
/// whole under the lock, so a reader never observes a half-applied update.
/// Entries are never removed automatically; call `remove` to reclaim space.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: Mutex<HashMap<String, ProgressEntry>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or overwrites) the entry for `operation_id`. `total_units`
    /// may be 0 when the expected count is unknown up front.
    pub fn start(&self, operation_id: &str, total_units: u64) {
        let mut entries = self.entries.lock().expect("progress registry poisoned");
        entries.insert(
            operation_id.to_string(),
            ProgressEntry {
                total_units,
                processed_units: 0,
                started_at: Instant::now(),
                status: OperationStatus::Pending,
                message: "Starting operation...".to_string(),
            },
        );
    }

    /// Records forward progress. A no-op for unknown ids (never creates an
    /// entry) and for entries already in a terminal state. `processed_units`
    /// is clamped to be non-decreasing.
    pub fn update(&self, operation_id: &str, processed_units: u64, message: &str) {
        let mut entries = self.entries.lock().expect("progress registry poisoned");
        if let Some(entry) = entries.get_mut(operation_id) {
            if entry.status.is_terminal() {
                return;
            }
            entry.status = OperationStatus::InProgress;
            entry.processed_units = entry.processed_units.max(processed_units);
            entry.message = message.to_string();
        }
    }

    /// Marks the operation COMPLETED, forcing `processed == total`. When the
    /// total was unknown (0) it is back-filled from the processed count.
    pub fn complete(&self, operation_id: &str, message: &str) {
        let mut entries = self.entries.lock().expect("progress registry poisoned");
        if let Some(entry) = entries.get_mut(operation_id) {
            if entry.status.is_terminal() {
                return;
            }
            if entry.total_units == 0 {
                entry.total_units = entry.processed_units;
            }
            entry.processed_units = entry.total_units;
            entry.status = OperationStatus::Completed;
            entry.message = message.to_string();
        }
    }

    /// Marks the operation FAILED with the failure reason.
    pub fn fail(&self, operation_id: &str, message: &str) {
        let mut entries = self.entries.lock().expect("progress registry poisoned");
        if let Some(entry) = entries.get_mut(operation_id) {
            if entry.status.is_terminal() {
                return;
            }
            entry.status = OperationStatus::Failed;
            entry.message = message.to_string();
        }
    }

    /// Snapshot for pollers; `None` for unknown ids.
    pub fn get(&self, operation_id: &str) -> Option<ProgressSnapshot> {
        let entries = self.entries.lock().expect("progress registry poisoned");
        entries.get(operation_id).map(|entry| ProgressSnapshot {
            operation_id: operation_id.to_string(),
            processed_units: entry.processed_units,
            total_units: entry.total_units,
            elapsed_ms: entry.started_at.elapsed().as_millis() as u64,
            completed: entry.status.is_terminal(),
            status: entry.status,
            message: entry.message.clone(),
        })
    }

    /// Deletes the entry unconditionally, terminal or not.
    pub fn remove(&self, operation_id: &str) -> bool {
        let mut entries = self.entries.lock().expect("progress registry poisoned");
        entries.remove(operation_id).is_some()
    }
}

/// Borrowed (registry, operation id) pair handed to pipeline stages so they
/// can report without knowing who owns the registry.
#[derive(Clone, Copy)]
pub struct ProgressSink<'a> {
    registry: &'a ProgressRegistry,
    operation_id: &'a str,
}

impl<'a> ProgressSink<'a> {
    pub fn new(registry: &'a ProgressRegistry, operation_id: &'a str) -> Self {
        Self {
            registry,
            operation_id,
        }
    }

    pub fn start(&self, total_units: u64) {
        self.registry.start(self.operation_id, total_units);
    }

    pub fn update(&self, processed_units: u64, message: &str) {
        self.registry.update(self.operation_id, processed_units, message);
    }

    pub fn complete(&self, message: &str) {
        self.registry.complete(self.operation_id, message);
    }

    pub fn fail(&self, message: &str) {
        self.registry.fail(self.operation_id, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_monotonic_and_terminal_states_absorb() {
        let reg = ProgressRegistry::new();
        reg.start("op", 100);
        reg.update("op", 10, "ten");
        reg.update("op", 5, "stale");
        let snap = reg.get("op").unwrap();
        assert_eq!(snap.processed_units, 10);
        assert_eq!(snap.status, OperationStatus::InProgress);

        reg.complete("op", "done");
        reg.update("op", 50, "late update");
        reg.fail("op", "late fail");
        let snap = reg.get("op").unwrap();
        assert_eq!(snap.status, OperationStatus::Completed);
        assert_eq!(snap.processed_units, 100);
        assert_eq!(snap.message, "done");
        assert!(snap.completed);
    }

    #[test]
    fn update_never_creates_entries() {
        let reg = ProgressRegistry::new();
        reg.update("ghost", 5, "hello");
        assert!(reg.get("ghost").is_none());
    }

    #[test]
    fn complete_backfills_unknown_total() {
        let reg = ProgressRegistry::new();
        reg.start("op", 0);
        reg.update("op", 42, "parsing");
        reg.complete("op", "done");
        let snap = reg.get("op").unwrap();
        assert_eq!(snap.total_units, 42);
        assert_eq!(snap.processed_units, 42);
    }

    #[test]
    fn remove_is_unconditional() {
        let reg = ProgressRegistry::new();
        reg.start("op", 10);
        assert!(reg.remove("op"));
        assert!(!reg.remove("op"));
        assert!(reg.get("op").is_none());
    }

    #[test]
    fn concurrent_pollers_see_consistent_snapshots() {
        use std::sync::Arc;

        let reg = Arc::new(ProgressRegistry::new());
        reg.start("op", 1000);

        let writer = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                for i in 1..=1000u64 {
                    reg.update("op", i, &format!("{} of 1000", i));
                }
                reg.complete("op", "done");
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    let mut last = 0u64;
                    for _ in 0..500 {
                        if let Some(snap) = reg.get("op") {
                            assert!(snap.processed_units >= last);
                            last = snap.processed_units;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(reg.get("op").unwrap().status, OperationStatus::Completed);
    }
}
