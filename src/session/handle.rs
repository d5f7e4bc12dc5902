use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::{
    broadcast::Broadcaster,
    common::types::{AccountId, SessionId},
    configs::BroadcastConfig,
    services::StreamingService,
    session::metrics::SessionMetrics,
};

/// Process-local resources of a live session. The session's state itself
/// lives in the store; this only carries what cannot be stored.
pub struct SessionHandle {
    pub id: SessionId,
    pub streaming: Arc<dyn StreamingService>,
    pub broadcaster: Broadcaster,
    pub metrics: Mutex<SessionMetrics>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        admin_account_id: AccountId,
        streaming: Arc<dyn StreamingService>,
        broadcast: &BroadcastConfig,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            id,
            streaming,
            broadcaster: Broadcaster::new(id, broadcast),
            metrics: Mutex::new(SessionMetrics::new(id, admin_account_id)),
            cancel: parent.child_token(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signals every watcher of this session to exit.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.tasks.lock().retain(|task| !task.is_finished());
    }

    pub fn running_tasks(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        tracing::debug!("[{}] Dropping session handle", self.id);
        self.cancel.cancel();
    }
}
