use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::ipc::error::{err, ok, pipeline_err};
use crate::ipc::types::{AppState, Request};
use crate::progress::ProgressSink;
use crate::{convert, job, load, sheet};

/// Starts background sheet generation and returns the operation id
/// immediately; progress is observable via `data.progress`.
fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(records) = req.params.get("records").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing params.records", None);
    };
    let file_name = req
        .params
        .get("fileName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let operation_id = req
        .params
        .get("operationId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };

    // Create the entry before the worker is scheduled so an immediate poll
    // never sees not-found for an id we just handed out.
    state.progress.start(&operation_id, records);

    let registry = Arc::clone(&state.progress);
    let worker_id = operation_id.clone();
    let spawned = job::spawn(&operation_id, move || {
        let sink = ProgressSink::new(&registry, &worker_id);
        let outcome = sheet::generate_sheet(&workspace, records, file_name.as_deref(), Some(sink))
            .with_context(|| {
                format!("generating {} records under {}", records, workspace.display())
            });
        if let Err(e) = outcome {
            // Usually already FAILED by generate_sheet; this covers failures
            // before the writer took over the entry.
            sink.fail(&format!("Generation failed: {:#}", e));
            error!(operation_id = %worker_id, error = ?e, "sheet generation failed");
        }
    });

    match spawned {
        Ok(handle) => {
            info!(operation_id = %handle.operation_id, records, "sheet generation started");
            // Fire and forget; the registry is the only channel back.
            drop(handle);
            ok(&req.id, json!({ "operationId": operation_id }))
        }
        Err(e) => {
            state.progress.fail(&operation_id, &format!("Failed to start: {}", e));
            err(&req.id, "io_error", e.to_string(), None)
        }
    }
}

fn handle_convert_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let operation_id = req
        .params
        .get("operationId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let registry = Arc::clone(&state.progress);
    let sink = operation_id
        .as_deref()
        .map(|id| ProgressSink::new(&registry, id));

    match convert::convert_sheet(&PathBuf::from(path), sink) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "path": outcome.path.to_string_lossy(),
                "fileName": outcome.file_name,
                "recordsWritten": outcome.records_written
            }),
        ),
        Err(e) => pipeline_err(&req.id, &e),
    }
}

fn handle_load_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let operation_id = req
        .params
        .get("operationId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let registry = Arc::clone(&state.progress);
    let sink = operation_id
        .as_deref()
        .map(|id| ProgressSink::new(&registry, id));

    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };

    match load::load_csv(conn, &PathBuf::from(path), sink) {
        Ok(outcome) => ok(
            &req.id,
            json!({ "recordsInserted": outcome.records_inserted }),
        ),
        Err(e) => pipeline_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.generate" => Some(handle_generate(state, req)),
        "data.convertSheet" => Some(handle_convert_sheet(state, req)),
        "data.loadCsv" => Some(handle_load_csv(state, req)),
        _ => None,
    }
}
