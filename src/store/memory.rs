use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    common::errors::StoreError,
    store::{LockGuard, StateStore},
};

/// In-process store with a per-key lock table. Suitable for a single server
/// instance; shared deployments plug a remote backend into [`StateStore`].
pub struct MemoryStore {
    values: DashMap<String, Vec<u8>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    lock_timeout: Duration,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            values: DashMap::new(),
            locks: DashMap::new(),
            lock_timeout,
            offline: AtomicBool::new(false),
        }
    }

    /// Makes every value operation fail with [`StoreError::Unavailable`]
    /// until switched back, the way a dropped connection would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_online()?;
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check_online()?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.values.remove(key);
        Ok(())
    }

    async fn acquire(&self, lock_key: &str) -> Result<LockGuard, StoreError> {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self
            .locks
            .entry(lock_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        match tokio::time::timeout(self.lock_timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockGuard::new(lock_key, guard)),
            Err(_) => Err(StoreError::LockTimeout(lock_key.to_string())),
        }
    }

    async fn forget_lock(&self, lock_key: &str) {
        self.locks.remove(lock_key);
    }
}
