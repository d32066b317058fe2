use std::io;
use std::thread::{Builder, JoinHandle};

/// Handle to a spawned background operation.
///
/// The operation id is the only channel observers have back to the work (via
/// the progress registry); dropping the handle detaches the thread, which is
/// the normal fire-and-forget mode for daemon-launched operations. Tests hold
/// on to the handle and `join`.
pub struct OperationHandle {
    pub operation_id: String,
    handle: JoinHandle<()>,
}

impl OperationHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker to finish. Worker panics are swallowed; outcome
    /// inspection happens through the progress registry.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Spawns a named worker thread for one long-running operation. Once started
/// the operation runs to completion or failure; there is no cancellation.
pub fn spawn<F>(operation_id: &str, work: F) -> io::Result<OperationHandle>
where
    F: FnOnce() + Send + 'static,
{
    let handle = Builder::new()
        .name(format!("op-{}", operation_id))
        .spawn(work)?;
    Ok(OperationHandle {
        operation_id: operation_id.to_string(),
        handle,
    })
}
