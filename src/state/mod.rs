//! Typed accessors over the state store.
//!
//! Each entity is read and written under its own lock; no accessor ever
//! holds two locks at once. Store faults are logged here and surface as the
//! entity's zero value (or `None` for mutations) so background tasks keep
//! running through a transient outage.

pub mod models;

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{
    common::{
        errors::StoreError,
        types::{AccountId, SessionId, now_ms},
    },
    configs::SessionConfig,
    store::{EntityKind, StateStore, StoreKey},
};

pub use models::*;

#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn StateStore>,
    config: SessionConfig,
}

impl SessionState {
    pub fn new(store: Arc<dyn StateStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    // -- generic entity access ----------------------------------------------

    async fn load<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Option<T>, StoreError> {
        match self.store.get(&key.value_key()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, key: &StoreKey, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(&key.value_key(), bytes).await
    }

    async fn write<T: Serialize + Sync>(&self, key: StoreKey, value: &T) {
        let result = async {
            let _guard = self.store.acquire(&key.lock_key()).await?;
            self.save(&key, value).await
        }
        .await;

        if let Err(e) = result {
            warn!("[{}] Error writing {}: {}", key.session_id, key.value_key(), e);
        }
    }

    async fn try_read<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StoreError> {
        let guard = self.store.acquire(&key.lock_key()).await?;
        let value = self.load(&key).await;
        if matches!(value, Ok(None)) {
            drop(guard);
            self.store.forget_lock(&key.lock_key()).await;
        }
        value
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: StoreKey) -> T {
        match self.try_read(key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!("[{}] Error reading {}: {}", key.session_id, key.value_key(), e);
                T::default()
            }
        }
    }

    /// Read-modify-write under the entity's lock. Absent entities are left
    /// absent so late writers cannot resurrect an ended session.
    async fn try_mutate<T, R, F>(&self, key: StoreKey, f: F) -> Result<Option<R>, StoreError>
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync,
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        let guard = self.store.acquire(&key.lock_key()).await?;

        let mut value: T = match self.load(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                drop(guard);
                self.store.forget_lock(&key.lock_key()).await;
                return Ok(None);
            }
            Err(StoreError::Codec(e)) => {
                warn!(
                    "[{}] Discarding undecodable {}: {}",
                    key.session_id,
                    key.value_key(),
                    e
                );
                T::default()
            }
            Err(e) => return Err(e),
        };

        let out = f(&mut value);
        self.save(&key, &value).await?;
        drop(guard);
        Ok(Some(out))
    }

    async fn mutate<T, R, F>(&self, key: StoreKey, f: F) -> Option<R>
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync,
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        match self.try_mutate(key, f).await {
            Ok(out) => out,
            Err(e) => {
                warn!("[{}] Error updating {}: {}", key.session_id, key.value_key(), e);
                None
            }
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Writes every entity of a fresh session.
    pub async fn init_session(&self, record: &SessionRecord) {
        let id = record.session_id;
        self.write(StoreKey::new(EntityKind::Expiry, id), &self.next_expiry())
            .await;
        self.write(StoreKey::new(EntityKind::Queue, id), &QueueRecord::default())
            .await;
        self.write(StoreKey::new(EntityKind::Voters, id), &VoterMap::new())
            .await;
        self.write(StoreKey::new(EntityKind::VoterCount, id), &0u32)
            .await;
        self.write(
            StoreKey::new(EntityKind::CurrentlyPlaying, id),
            &CurrentlyPlaying::default(),
        )
        .await;
        self.write(StoreKey::new(EntityKind::BonusVotes, id), &BonusLedger::new())
            .await;
        // Config last: its presence is what marks the session as existing.
        self.write(StoreKey::new(EntityKind::Config, id), record).await;
    }

    /// Deletes every value and lock key of a session.
    pub async fn purge(&self, session_id: SessionId) {
        for key in StoreKey::all(session_id) {
            let result = async {
                let _guard = self.store.acquire(&key.lock_key()).await?;
                self.store.delete(&key.value_key()).await
            }
            .await;
            if let Err(e) = result {
                warn!("[{}] Error deleting {}: {}", session_id, key.value_key(), e);
            }
            self.store.forget_lock(&key.lock_key()).await;
        }
    }

    // -- config -------------------------------------------------------------

    pub async fn record(&self, session_id: SessionId) -> Option<SessionRecord> {
        match self
            .try_read(StoreKey::new(EntityKind::Config, session_id))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!("[{}] Error getting session config: {}", session_id, e);
                None
            }
        }
    }

    pub async fn exists(&self, session_id: SessionId) -> bool {
        self.record(session_id).await.is_some()
    }

    pub async fn admin_account(&self, session_id: SessionId) -> Option<AccountId> {
        self.record(session_id).await.map(|r| r.admin_account_id)
    }

    pub async fn maximum_voters(&self, session_id: SessionId) -> u32 {
        self.record(session_id)
            .await
            .map(|r| r.maximum_voters)
            .unwrap_or_default()
    }

    // -- queue --------------------------------------------------------------

    pub async fn queue(&self, session_id: SessionId) -> QueueRecord {
        self.read(StoreKey::new(EntityKind::Queue, session_id)).await
    }

    pub async fn update_queue<R, F>(&self, session_id: SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut QueueRecord) -> R + Send,
        R: Send,
    {
        self.mutate(StoreKey::new(EntityKind::Queue, session_id), f)
            .await
    }

    // -- voters -------------------------------------------------------------

    pub async fn voters(&self, session_id: SessionId) -> VoterMap {
        self.read(StoreKey::new(EntityKind::Voters, session_id))
            .await
    }

    pub async fn update_voters<R, F>(&self, session_id: SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut VoterMap) -> R + Send,
        R: Send,
    {
        self.mutate(StoreKey::new(EntityKind::Voters, session_id), f)
            .await
    }

    pub async fn voter_count(&self, session_id: SessionId) -> u32 {
        self.read(StoreKey::new(EntityKind::VoterCount, session_id))
            .await
    }

    /// Applies a signed change so concurrent joins and prunes commute.
    pub async fn adjust_voter_count(&self, session_id: SessionId, delta: i64) -> Option<u32> {
        self.mutate(
            StoreKey::new(EntityKind::VoterCount, session_id),
            move |count: &mut u32| {
                *count = (i64::from(*count) + delta).max(0) as u32;
                *count
            },
        )
        .await
    }

    // -- currently playing --------------------------------------------------

    pub async fn currently_playing(&self, session_id: SessionId) -> CurrentlyPlaying {
        self.read(StoreKey::new(EntityKind::CurrentlyPlaying, session_id))
            .await
    }

    pub async fn update_currently_playing<R, F>(&self, session_id: SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut CurrentlyPlaying) -> R + Send,
        R: Send,
    {
        self.mutate(StoreKey::new(EntityKind::CurrentlyPlaying, session_id), f)
            .await
    }

    // -- bonus votes --------------------------------------------------------

    pub async fn bonus_votes(&self, session_id: SessionId) -> BonusLedger {
        self.read(StoreKey::new(EntityKind::BonusVotes, session_id))
            .await
    }

    pub async fn update_bonus_votes<R, F>(&self, session_id: SessionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut BonusLedger) -> R + Send,
        R: Send,
    {
        self.mutate(StoreKey::new(EntityKind::BonusVotes, session_id), f)
            .await
    }

    // -- expiry -------------------------------------------------------------

    fn next_expiry(&self) -> u64 {
        now_ms().saturating_add(self.config.timeout().as_millis() as u64)
    }

    pub async fn expires_at(&self, session_id: SessionId) -> Option<u64> {
        match self
            .try_read(StoreKey::new(EntityKind::Expiry, session_id))
            .await
        {
            Ok(expires_at) => expires_at,
            Err(e) => {
                warn!("[{}] Error getting session expiration: {}", session_id, e);
                None
            }
        }
    }

    /// A missing expiry means the session is gone. A store fault does not
    /// count as expiry, so watchers survive a transient outage.
    pub async fn is_expired(&self, session_id: SessionId) -> bool {
        match self
            .try_read::<u64>(StoreKey::new(EntityKind::Expiry, session_id))
            .await
        {
            Ok(Some(expires_at)) => now_ms() > expires_at,
            Ok(None) => true,
            Err(e) => {
                warn!("[{}] Error getting session expiration: {}", session_id, e);
                false
            }
        }
    }

    /// Pushes expiry forward. Never moves it back and never revives a
    /// session that has already expired.
    pub async fn refresh_expiry(&self, session_id: SessionId) {
        let next = self.next_expiry();
        let now = now_ms();
        self.mutate(
            StoreKey::new(EntityKind::Expiry, session_id),
            move |expires_at: &mut u64| {
                if *expires_at >= now {
                    *expires_at = (*expires_at).max(next);
                }
            },
        )
        .await;
    }

    /// Marks the session expired as of the previous millisecond, so no
    /// refresh racing with this call can extend it.
    pub async fn expire_now(&self, session_id: SessionId) {
        let expired = now_ms().saturating_sub(1);
        self.mutate(
            StoreKey::new(EntityKind::Expiry, session_id),
            move |expires_at: &mut u64| *expires_at = expired,
        )
        .await;
    }

    // -- composed view ------------------------------------------------------

    pub async fn snapshot(&self, session_id: SessionId) -> SessionSnapshot {
        let record = self.record(session_id).await;
        SessionSnapshot {
            session_id,
            admin_account_id: record.as_ref().map(|r| r.admin_account_id),
            currently_playing: self.currently_playing(session_id).await,
            queue: self.queue(session_id).await.songs,
            number_of_voters: self.voter_count(session_id).await,
            maximum_voters: record.map(|r| r.maximum_voters).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, SessionState) {
        let store = Arc::new(MemoryStore::new(Duration::from_millis(200)));
        let state = SessionState::new(store.clone(), SessionConfig::default());
        (store, state)
    }

    fn record(id: u32) -> SessionRecord {
        SessionRecord {
            session_id: SessionId(id),
            admin_account_id: AccountId(123),
            maximum_voters: 50,
            created_at_ms: now_ms(),
        }
    }

    #[tokio::test]
    async fn test_init_writes_every_entity() {
        let (store, state) = setup();
        state.init_session(&record(100100)).await;

        for key in StoreKey::all(SessionId(100100)) {
            assert!(store.contains_key(&key.value_key()), "{}", key.value_key());
        }
        assert!(state.exists(SessionId(100100)).await);
        assert!(!state.is_expired(SessionId(100100)).await);
        assert_eq!(state.maximum_voters(SessionId(100100)).await, 50);
    }

    #[tokio::test]
    async fn test_purge_leaves_no_keys_or_locks() {
        let (store, state) = setup();
        state.init_session(&record(100200)).await;
        state.purge(SessionId(100200)).await;

        assert_eq!(store.value_count(), 0);
        assert_eq!(store.lock_count(), 0);
        assert!(!state.exists(SessionId(100200)).await);
        assert!(state.is_expired(SessionId(100200)).await);
    }

    #[tokio::test]
    async fn test_mutations_on_missing_session_are_dropped() {
        let (store, state) = setup();
        let out = state
            .update_queue(SessionId(100300), |q| q.songs.len())
            .await;
        assert_eq!(out, None);
        state.refresh_expiry(SessionId(100300)).await;

        assert_eq!(store.value_count(), 0);
        assert_eq!(store.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_store_fault_reads_as_empty() {
        let (store, state) = setup();
        let id = SessionId(100400);
        state.init_session(&record(100400)).await;
        state.adjust_voter_count(id, 3).await;

        store.set_offline(true);
        assert_eq!(state.voter_count(id).await, 0);
        assert!(state.queue(id).await.songs.is_empty());
        assert_eq!(state.adjust_voter_count(id, 1).await, None);
        assert!(!state.is_expired(id).await);

        store.set_offline(false);
        assert_eq!(state.voter_count(id).await, 3);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_replaced() {
        let (store, state) = setup();
        let id = SessionId(100500);
        state.init_session(&record(100500)).await;
        store
            .set(
                &StoreKey::new(EntityKind::VoterCount, id).value_key(),
                b"not json".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(state.voter_count(id).await, 0);
        assert_eq!(state.adjust_voter_count(id, 2).await, Some(2));
        assert_eq!(state.voter_count(id).await, 2);
    }

    #[tokio::test]
    async fn test_voter_count_never_goes_negative() {
        let (_, state) = setup();
        let id = SessionId(100600);
        state.init_session(&record(100600)).await;
        assert_eq!(state.adjust_voter_count(id, -5).await, Some(0));
    }

    #[tokio::test]
    async fn test_expiry_moves_forward_only_until_expired() {
        let (_, state) = setup();
        let id = SessionId(100700);
        state.init_session(&record(100700)).await;

        let before = state.expires_at(id).await.unwrap();
        state.refresh_expiry(id).await;
        assert!(state.expires_at(id).await.unwrap() >= before);

        state.expire_now(id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(state.is_expired(id).await);

        state.refresh_expiry(id).await;
        assert!(state.is_expired(id).await);
    }

    #[tokio::test]
    async fn test_snapshot_composes_entities() {
        let (_, state) = setup();
        let id = SessionId(100800);
        state.init_session(&record(100800)).await;
        state.adjust_voter_count(id, 1).await;

        let snapshot = state.snapshot(id).await;
        assert_eq!(snapshot.session_id, id);
        assert_eq!(snapshot.admin_account_id, Some(AccountId(123)));
        assert_eq!(snapshot.number_of_voters, 1);
        assert_eq!(snapshot.maximum_voters, 50);
        assert!(snapshot.queue.is_empty());
    }
}
