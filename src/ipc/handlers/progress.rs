use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_progress_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(operation_id) = req.params.get("operationId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.operationId", None);
    };

    match state.progress.get(operation_id) {
        Some(snapshot) => match serde_json::to_value(&snapshot) {
            Ok(value) => ok(&req.id, value),
            Err(e) => err(&req.id, "internal", e.to_string(), None),
        },
        None => err(
            &req.id,
            "not_found",
            format!("unknown operation id: {}", operation_id),
            None,
        ),
    }
}

fn handle_progress_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(operation_id) = req.params.get("operationId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.operationId", None);
    };
    let removed = state.progress.remove(operation_id);
    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.progress" => Some(handle_progress_get(state, req)),
        "data.progressRemove" => Some(handle_progress_remove(state, req)),
        _ => None,
    }
}
