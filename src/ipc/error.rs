use serde_json::json;

use crate::error::PipelineError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps the core error taxonomy onto the wire error codes.
pub fn pipeline_err(id: &str, e: &PipelineError) -> serde_json::Value {
    let code = match e {
        PipelineError::Io(_) => "io_error",
        PipelineError::Sheet(_) | PipelineError::Format(_) | PipelineError::Csv(_) => "bad_input",
        PipelineError::Storage(_) => "db_error",
    };
    err(id, code, e.to_string(), None)
}
