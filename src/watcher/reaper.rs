use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{common::types::SessionId, session::SessionManager};

/// Starts the global reaper. It runs until the manager shuts down.
pub fn spawn(manager: Arc<SessionManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = manager.config().watchers.reaper_interval();
        let shutdown = manager.shutdown_token().clone();
        info!("Session reaper started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Session reaper stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let reaped = reap_expired(&manager).await;
            if !reaped.is_empty() {
                info!("Reaped {} expired sessions", reaped.len());
            }
        }
    })
}

/// Ends every live session whose expiry has passed and returns their ids.
pub async fn reap_expired(manager: &SessionManager) -> Vec<SessionId> {
    // Collect first so no registry shard is held while sessions end.
    let live = manager.live_sessions();

    let mut expired = Vec::new();
    for session_id in live {
        if manager.state().is_expired(session_id).await {
            expired.push(session_id);
        }
    }

    for session_id in &expired {
        if let Err(e) = manager.end_session(*session_id).await {
            warn!("[{}] Error ending expired session: {}", session_id, e);
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        common::types::AccountId,
        services::AccountTier,
        testing::{TestEnv, test_config},
    };

    #[tokio::test]
    async fn test_reap_ends_only_expired_sessions() {
        let env = TestEnv::new(test_config());
        let stale = env.create(AccountId(1), AccountTier::Free).await;
        let live = env.create(AccountId(2), AccountTier::Free).await;
        env.manager.state().expire_now(stale).await;

        assert_eq!(reap_expired(&env.manager).await, vec![stale]);
        assert_eq!(env.manager.live_sessions(), vec![live]);
        assert!(!env.manager.does_session_exist(stale).await);
        assert_eq!(env.manager.completed_session_metrics().await.unwrap().len(), 1);

        assert!(reap_expired(&env.manager).await.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_reaper_runs_until_shutdown() {
        let mut config = test_config();
        config.watchers.reaper_interval_ms = 5;
        let env = TestEnv::new(config);
        let id = env.create(AccountId(1), AccountTier::Free).await;
        let reaper = env.manager.spawn_reaper();

        env.manager.state().expire_now(id).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(env.manager.live_sessions().is_empty());

        env.manager.shutdown();
        tokio::time::timeout(Duration::from_secs(1), reaper)
            .await
            .unwrap()
            .unwrap();
    }
}
