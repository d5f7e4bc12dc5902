//! Interfaces of the collaborators the session engine drives but does not
//! implement: the streaming provider, the account store and durable
//! metrics storage.

pub mod metrics_sink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    common::{
        errors::ServiceError,
        types::{AccountId, SongId},
    },
    state::models::{CurrentlyPlaying, SimpleSong},
};

pub use metrics_sink::{MemoryMetricsSink, MetricsSink};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    Free,
    Plus,
    Premium,
}

impl AccountTier {
    pub fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// What the provider reports is playing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub song: Option<SimpleSong>,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackState {
    pub fn to_currently_playing(&self) -> CurrentlyPlaying {
        CurrentlyPlaying {
            song: self.song.clone(),
            playing: self.is_playing,
            progress_ms: self.progress_ms,
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub image: String,
}

/// Per-session handle to the admin's streaming account.
#[async_trait]
pub trait StreamingService: Send + Sync {
    async fn play(&self) -> ServiceResult<()>;

    async fn pause(&self) -> ServiceResult<()>;

    async fn advance_to_next(&self) -> ServiceResult<()>;

    /// Appends a song to the provider's own up-next queue.
    async fn queue_song(&self, song_id: &SongId) -> ServiceResult<()>;

    async fn current_song(&self) -> ServiceResult<PlaybackState>;

    /// Milliseconds left in the current track.
    async fn time_remaining(&self) -> ServiceResult<u64>;

    async fn playlists(&self) -> ServiceResult<Vec<Playlist>>;

    async fn songs_in_playlist(&self, playlist_id: &str) -> ServiceResult<Vec<SimpleSong>>;

    async fn search(&self, query: &str) -> ServiceResult<Vec<SimpleSong>>;
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn subtract_bonus_votes(&self, account_id: AccountId, count: u32) -> ServiceResult<()>;

    async fn account_tier(&self, account_id: AccountId) -> ServiceResult<AccountTier>;
}
