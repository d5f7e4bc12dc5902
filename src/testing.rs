//! In-process collaborators and fixtures for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::{
    common::{
        errors::ServiceError,
        types::{AccountId, SessionId, SongId},
    },
    configs::Config,
    services::{
        AccountService, AccountTier, MemoryMetricsSink, PlaybackState, Playlist, ServiceResult,
        StreamingService,
    },
    session::SessionManager,
    state::models::SimpleSong,
    store::MemoryStore,
};

/// Watcher intervals long enough that background polls never interfere
/// with a test unless it waits for them.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store.lock_timeout_ms = 1_000;
    config.watchers.streaming_slow_interval_ms = 60_000;
    config.watchers.streaming_fast_interval_ms = 60_000;
    config.watchers.voter_interval_ms = 60_000;
    config.watchers.reaper_interval_ms = 60_000;
    config
}

#[derive(Debug, Default)]
pub struct MockStreamingState {
    pub playback: PlaybackState,
    pub remaining_ms: u64,
    pub queued: Vec<SongId>,
    pub skips: usize,
    pub plays: usize,
    pub pauses: usize,
    pub fail_queue: bool,
    pub fail_current: bool,
}

#[derive(Default)]
pub struct MockStreaming {
    state: Mutex<MockStreamingState>,
}

impl MockStreaming {
    pub fn state(&self) -> MutexGuard<'_, MockStreamingState> {
        self.state.lock()
    }

    pub fn set_playback(&self, song: Option<SimpleSong>, is_playing: bool, remaining_ms: u64) {
        let mut state = self.state.lock();
        state.playback = PlaybackState {
            song,
            is_playing,
            progress_ms: 0,
            duration_ms: remaining_ms,
        };
        state.remaining_ms = remaining_ms;
    }
}

#[async_trait]
impl StreamingService for MockStreaming {
    async fn play(&self) -> ServiceResult<()> {
        self.state.lock().plays += 1;
        Ok(())
    }

    async fn pause(&self) -> ServiceResult<()> {
        self.state.lock().pauses += 1;
        Ok(())
    }

    async fn advance_to_next(&self) -> ServiceResult<()> {
        self.state.lock().skips += 1;
        Ok(())
    }

    async fn queue_song(&self, song_id: &SongId) -> ServiceResult<()> {
        let mut state = self.state.lock();
        if state.fail_queue {
            return Err(ServiceError::new("queue rejected"));
        }
        state.queued.push(song_id.clone());
        Ok(())
    }

    async fn current_song(&self) -> ServiceResult<PlaybackState> {
        let state = self.state.lock();
        if state.fail_current {
            return Err(ServiceError::new("provider unavailable"));
        }
        Ok(state.playback.clone())
    }

    async fn time_remaining(&self) -> ServiceResult<u64> {
        Ok(self.state.lock().remaining_ms)
    }

    async fn playlists(&self) -> ServiceResult<Vec<Playlist>> {
        Ok(Vec::new())
    }

    async fn songs_in_playlist(&self, _playlist_id: &str) -> ServiceResult<Vec<SimpleSong>> {
        Ok(Vec::new())
    }

    async fn search(&self, _query: &str) -> ServiceResult<Vec<SimpleSong>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockAccounts {
    tiers: Mutex<HashMap<AccountId, AccountTier>>,
    failing: Mutex<HashSet<AccountId>>,
    subtractions: Mutex<Vec<(AccountId, u32)>>,
}

impl MockAccounts {
    pub fn set_tier(&self, account_id: AccountId, tier: AccountTier) {
        self.tiers.lock().insert(account_id, tier);
    }

    pub fn fail_for(&self, account_id: AccountId) {
        self.failing.lock().insert(account_id);
    }

    /// Successful subtractions, in account order.
    pub fn subtractions(&self) -> Vec<(AccountId, u32)> {
        let mut subtractions = self.subtractions.lock().clone();
        subtractions.sort();
        subtractions
    }
}

#[async_trait]
impl AccountService for MockAccounts {
    async fn subtract_bonus_votes(&self, account_id: AccountId, count: u32) -> ServiceResult<()> {
        if self.failing.lock().contains(&account_id) {
            return Err(ServiceError::new("account store unavailable"));
        }
        self.subtractions.lock().push((account_id, count));
        Ok(())
    }

    async fn account_tier(&self, account_id: AccountId) -> ServiceResult<AccountTier> {
        self.tiers
            .lock()
            .get(&account_id)
            .copied()
            .ok_or_else(|| ServiceError::new(format!("unknown account {account_id}")))
    }
}

pub struct TestEnv {
    pub manager: Arc<SessionManager>,
    pub store: Arc<MemoryStore>,
    pub streaming: Arc<MockStreaming>,
    pub accounts: Arc<MockAccounts>,
}

impl TestEnv {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new(config.store.lock_timeout()));
        let accounts = Arc::new(MockAccounts::default());
        let manager = SessionManager::new(
            config,
            store.clone(),
            accounts.clone(),
            Arc::new(MemoryMetricsSink::new()),
        );
        Self {
            manager,
            store,
            streaming: Arc::new(MockStreaming::default()),
            accounts,
        }
    }

    pub async fn create(&self, admin: AccountId, tier: AccountTier) -> SessionId {
        self.manager
            .create_session(admin, tier, self.streaming.clone())
            .await
            .unwrap()
    }
}
