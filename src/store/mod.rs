//! Key/value state store with a companion named-lock primitive.
//!
//! Every session entity lives under one value key and is guarded by one lock
//! key. Backends may be in-process ([`MemoryStore`]) or shared between
//! server instances; callers only see the [`StateStore`] trait.

pub mod keys;
pub mod memory;

use std::any::Any;

use async_trait::async_trait;

use crate::common::errors::StoreError;

pub use keys::{EntityKind, StoreKey};
pub use memory::MemoryStore;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Waits for the named lock. Implementations must bound the wait so a
    /// crashed holder cannot stall callers forever.
    async fn acquire(&self, lock_key: &str) -> Result<LockGuard, StoreError>;

    /// Drops any bookkeeping for a lock key whose entity no longer exists.
    async fn forget_lock(&self, lock_key: &str);
}

/// Scoped ownership of a named lock. Released on drop, on every exit path.
pub struct LockGuard {
    key: String,
    _held: Box<dyn Any + Send + Sync>,
}

impl LockGuard {
    pub fn new(key: impl Into<String>, held: impl Any + Send + Sync) -> Self {
        Self {
            key: key.into(),
            _held: Box::new(held),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::trace!("Releasing lock {}", self.key);
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}
