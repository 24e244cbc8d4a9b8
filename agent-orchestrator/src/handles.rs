//! Registry of in-flight executions
//!
//! Each spawned execution gets a cancellation token and a join handle.
//! Cancelling only signals the token: the execution stops before its next
//! step, while a step that is already running finishes or times out.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct TrackedExecution {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Handles of executions that have not finished yet
pub struct ExecutionHandles {
    tracked: Arc<Mutex<HashMap<Uuid, TrackedExecution>>>,
}

impl ExecutionHandles {
    pub fn new() -> Self {
        Self {
            tracked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Track an execution before its task is spawned
    pub async fn register(&self, execution_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        let mut tracked = self.tracked.lock().await;
        tracked.insert(
            execution_id,
            TrackedExecution {
                token: token.clone(),
                handle: None,
            },
        );
        token
    }

    /// Attach the join handle of a spawned execution
    ///
    /// If the execution already finished the handle is simply dropped.
    pub async fn attach(&self, execution_id: Uuid, handle: JoinHandle<()>) {
        let mut tracked = self.tracked.lock().await;
        if let Some(entry) = tracked.get_mut(&execution_id) {
            entry.handle = Some(handle);
        }
    }

    /// Signal cancellation; returns false when the execution is not in flight
    pub async fn cancel(&self, execution_id: &Uuid) -> bool {
        let tracked = self.tracked.lock().await;
        match tracked.get(execution_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Called by an execution when it reaches a terminal state
    pub async fn finish(&self, execution_id: &Uuid) {
        self.tracked.lock().await.remove(execution_id);
    }

    pub async fn active_count(&self) -> usize {
        self.tracked.lock().await.len()
    }

    /// Cancel every in-flight execution and hand back their join handles
    pub async fn cancel_everything(&self) -> Vec<JoinHandle<()>> {
        let mut tracked = self.tracked.lock().await;
        tracked
            .drain()
            .filter_map(|(_, entry)| {
                entry.token.cancel();
                entry.handle
            })
            .collect()
    }
}

impl Clone for ExecutionHandles {
    fn clone(&self) -> Self {
        Self {
            tracked: Arc::clone(&self.tracked),
        }
    }
}

impl Default for ExecutionHandles {
    fn default() -> Self {
        Self::new()
    }
}
