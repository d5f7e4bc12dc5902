//! Session lifecycle: creation, lookup, voter registration and teardown.

pub mod handle;
pub mod metrics;

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    common::{
        errors::{SessionError, SessionResult},
        types::{AccountId, SessionId, VoterId, now_ms},
    },
    configs::Config,
    services::{AccountService, AccountTier, MetricsSink, ServiceResult, StreamingService},
    state::{
        SessionState,
        models::{SessionRecord, SessionSnapshot},
    },
    store::StateStore,
    voter::{Voter, VoterType},
    watcher,
};

pub use handle::SessionHandle;
pub use metrics::SessionMetrics;

enum Join {
    Added,
    Updated,
    Refused,
}

/// Owns the live-session registry and every session operation.
pub struct SessionManager {
    config: Config,
    state: SessionState,
    accounts: Arc<dyn AccountService>,
    metrics_sink: Arc<dyn MetricsSink>,
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    /// Ids picked by in-flight creations, not yet in `sessions`.
    reserved: DashSet<SessionId>,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        accounts: Arc<dyn AccountService>,
        metrics_sink: Arc<dyn MetricsSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: SessionState::new(store, config.session.clone()),
            config,
            accounts,
            metrics_sink,
            sessions: DashMap::new(),
            reserved: DashSet::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn accounts(&self) -> &Arc<dyn AccountService> {
        &self.accounts
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn live_sessions(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub(crate) fn handle(&self, session_id: SessionId) -> SessionResult<Arc<SessionHandle>> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::NotFound(session_id))
    }

    /// Resolves a session that may be owned by another server instance.
    /// Returns the local handle when this process runs the session.
    pub(crate) async fn ensure_exists(
        &self,
        session_id: SessionId,
    ) -> SessionResult<Option<Arc<SessionHandle>>> {
        if let Ok(handle) = self.handle(session_id) {
            return Ok(Some(handle));
        }
        if self.state.exists(session_id).await {
            return Ok(None);
        }
        Err(SessionError::NotFound(session_id))
    }

    // -- creation -----------------------------------------------------------

    async fn reserve_id(&self) -> SessionResult<SessionId> {
        let attempts = self.config.session.id_attempts.max(1);
        for _ in 0..attempts {
            let candidate = SessionId::generate();
            if self.sessions.contains_key(&candidate) || !self.reserved.insert(candidate) {
                continue;
            }
            if self.state.exists(candidate).await {
                self.reserved.remove(&candidate);
                continue;
            }
            return Ok(candidate);
        }
        warn!("No free session id after {} attempts", attempts);
        Err(SessionError::IdSpaceExhausted(attempts))
    }

    pub fn maximum_voters_for(&self, tier: AccountTier) -> u32 {
        if tier.is_paid() {
            0
        } else {
            self.config.session.free_tier_max_voters
        }
    }

    pub async fn create_session(
        self: &Arc<Self>,
        admin_account_id: AccountId,
        tier: AccountTier,
        streaming: Arc<dyn StreamingService>,
    ) -> SessionResult<SessionId> {
        let session_id = self.reserve_id().await?;

        let record = SessionRecord {
            session_id,
            admin_account_id,
            maximum_voters: self.maximum_voters_for(tier),
            created_at_ms: now_ms(),
        };
        self.state.init_session(&record).await;

        let admin = Voter::admin(admin_account_id);
        let admin_id = admin.id.clone();
        self.state
            .update_voters(session_id, move |voters| {
                voters.insert(admin.id.clone(), admin);
            })
            .await;
        self.state.adjust_voter_count(session_id, 1).await;

        let handle = Arc::new(SessionHandle::new(
            session_id,
            admin_account_id,
            streaming,
            &self.config.broadcast,
            &self.shutdown,
        ));
        handle
            .metrics
            .lock()
            .record_voter(&admin_id, VoterType::Admin);

        self.sessions.insert(session_id, handle.clone());
        self.reserved.remove(&session_id);

        handle.track(tokio::spawn(watcher::streaming::run(
            self.clone(),
            handle.clone(),
        )));
        handle.track(tokio::spawn(watcher::voters::run(
            self.clone(),
            handle.clone(),
        )));

        info!(
            "[{}] Session created for admin {} (tier {:?}, max voters {})",
            session_id, admin_account_id, tier, record.maximum_voters
        );
        Ok(session_id)
    }

    /// Looks up the admin's tier before creating the session.
    pub async fn create_session_for_account(
        self: &Arc<Self>,
        admin_account_id: AccountId,
        streaming: Arc<dyn StreamingService>,
    ) -> SessionResult<SessionId> {
        let tier = self
            .accounts
            .account_tier(admin_account_id)
            .await
            .map_err(SessionError::Account)?;
        self.create_session(admin_account_id, tier, streaming).await
    }

    // -- teardown -----------------------------------------------------------

    pub async fn end_session(&self, session_id: SessionId) -> SessionResult<()> {
        // Removing first makes teardown run at most once per session.
        let Some((_, handle)) = self.sessions.remove(&session_id) else {
            if self.state.exists(session_id).await {
                // Owned by another instance; its reaper finishes the job.
                self.state.expire_now(session_id).await;
                return Ok(());
            }
            return Err(SessionError::NotFound(session_id));
        };

        self.state.expire_now(session_id).await;
        handle.stop();
        handle.broadcaster.close_all();

        let metrics = {
            let mut metrics = handle.metrics.lock();
            metrics.finish();
            metrics.clone()
        };
        if let Err(e) = self.metrics_sink.write_completed(metrics).await {
            warn!("[{}] Error writing session metrics: {}", session_id, e);
        }

        self.state.purge(session_id).await;
        info!("[{}] Session ended", session_id);
        Ok(())
    }

    /// Stops the reaper and every watcher. Sessions stay in the store.
    pub fn shutdown(&self) {
        info!("Shutting down session manager ({} live sessions)", self.sessions.len());
        self.shutdown.cancel();
    }

    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        watcher::reaper::spawn(self.clone())
    }

    // -- queries ------------------------------------------------------------

    pub async fn does_session_exist(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id) || self.state.exists(session_id).await
    }

    pub async fn is_session_full(&self, session_id: SessionId) -> bool {
        let maximum_voters = self.state.maximum_voters(session_id).await;
        if maximum_voters == 0 {
            return false;
        }
        self.state.voter_count(session_id).await >= maximum_voters
    }

    pub async fn get_session_state(&self, session_id: SessionId) -> SessionResult<SessionSnapshot> {
        self.ensure_exists(session_id).await?;
        Ok(self.state.snapshot(session_id).await)
    }

    pub async fn session_admin(&self, session_id: SessionId) -> Option<AccountId> {
        self.state.admin_account(session_id).await
    }

    pub fn streaming(&self, session_id: SessionId) -> SessionResult<Arc<dyn StreamingService>> {
        Ok(self.handle(session_id)?.streaming.clone())
    }

    pub fn active_session_metrics(&self) -> Vec<SessionMetrics> {
        self.sessions
            .iter()
            .map(|entry| entry.value().metrics.lock().clone())
            .collect()
    }

    pub async fn completed_session_metrics(&self) -> ServiceResult<Vec<SessionMetrics>> {
        self.metrics_sink.completed().await
    }

    // -- subscribers --------------------------------------------------------

    /// Registers a subscriber and hands it the current state right away.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
    ) -> SessionResult<flume::Receiver<SessionSnapshot>> {
        let handle = self.handle(session_id)?;
        let snapshot = self.state.snapshot(session_id).await;
        Ok(handle.broadcaster.add_channel_with(snapshot))
    }

    /// Refreshes expiry, then pushes the composed state to subscribers.
    pub(crate) async fn send_updated_state(
        &self,
        session_id: SessionId,
        handle: Option<&SessionHandle>,
    ) {
        self.state.refresh_expiry(session_id).await;

        let Some(handle) = handle else { return };
        if handle.broadcaster.subscriber_count() == 0 {
            return;
        }
        let snapshot = self.state.snapshot(session_id).await;
        let delivered = handle.broadcaster.publish(snapshot).await;
        debug!("[{}] State update delivered to {} subscribers", session_id, delivered);
    }

    // -- voters -------------------------------------------------------------

    /// Adds or replaces a voter. New non-admin voters are refused once the
    /// session is at its cap.
    pub async fn upsert_voter(&self, session_id: SessionId, voter: Voter) -> SessionResult<()> {
        let handle = self.ensure_exists(session_id).await?;
        let maximum_voters = self.state.maximum_voters(session_id).await;
        let voter_id = voter.id.clone();
        let voter_type = voter.voter_type;

        let joined = self
            .state
            .update_voters(session_id, move |voters| {
                if voters.contains_key(&voter.id) {
                    voters.insert(voter.id.clone(), voter);
                    return Join::Updated;
                }
                if !voter.is_admin() && maximum_voters != 0 && voters.len() as u32 >= maximum_voters {
                    return Join::Refused;
                }
                voters.insert(voter.id.clone(), voter);
                Join::Added
            })
            .await;

        match joined {
            Some(Join::Refused) => {
                debug!("[{}] Refusing voter {}: session full", session_id, voter_id);
                return Err(SessionError::SessionFull(session_id));
            }
            Some(Join::Added) => {
                self.state.adjust_voter_count(session_id, 1).await;
                if let Some(handle) = &handle {
                    handle.metrics.lock().record_voter(&voter_id, voter_type);
                }
                debug!("[{}] Voter {} joined", session_id, voter_id);
            }
            Some(Join::Updated) | None => {}
        }

        self.send_updated_state(session_id, handle.as_deref()).await;
        Ok(())
    }

    pub async fn get_voter(&self, session_id: SessionId, voter_id: &VoterId) -> Option<Voter> {
        self.state.voters(session_id).await.remove(voter_id)
    }
}
