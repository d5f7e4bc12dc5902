use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    common::types::now_ms,
    session::{SessionHandle, SessionManager},
};

pub async fn run(manager: Arc<SessionManager>, handle: Arc<SessionHandle>) {
    let session_id = handle.id;
    let interval = manager.config().watchers.voter_interval();
    debug!("[{}] Voter watcher started", session_id);

    loop {
        if manager.state().is_expired(session_id).await {
            info!("[{}] Session expired, stopping voter watcher", session_id);
            return;
        }

        prune_expired_voters(&manager, &handle).await;

        tokio::select! {
            _ = handle.cancelled() => {
                debug!("[{}] Voter watcher stopped", session_id);
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Drops expired non-admin voters, but only while the session is full and
/// new voters are being turned away.
pub(crate) async fn prune_expired_voters(manager: &SessionManager, handle: &SessionHandle) -> usize {
    let session_id = handle.id;
    if !manager.is_session_full(session_id).await {
        return 0;
    }

    let now = now_ms();
    let removed = manager
        .state()
        .update_voters(session_id, move |voters| {
            let before = voters.len();
            voters.retain(|_, voter| !voter.is_expired(now));
            before - voters.len()
        })
        .await
        .unwrap_or_default();

    if removed > 0 {
        manager
            .state()
            .adjust_voter_count(session_id, -(removed as i64))
            .await;
        info!("[{}] Removed {} expired voters", session_id, removed);
        manager.send_updated_state(session_id, Some(handle)).await;
    }
    removed
}
