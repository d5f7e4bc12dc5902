use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    common::types::{AccountId, SessionId, SongId, VoterId},
    voter::Voter,
};

/// Song identity plus display metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleSong {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub image: String,
}

/// Song reference carried by a vote. Metadata is only needed the first time
/// a song enters the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongUpdate {
    pub id: SongId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl SongUpdate {
    pub fn id_only(id: impl Into<SongId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            artist: None,
            image: None,
        }
    }

    pub fn to_song(&self) -> SimpleSong {
        SimpleSong {
            id: self.id.clone(),
            title: self.title.clone().unwrap_or_default(),
            artist: self.artist.clone().unwrap_or_default(),
            image: self.image.clone().unwrap_or_default(),
        }
    }
}

impl From<&SimpleSong> for SongUpdate {
    fn from(song: &SimpleSong) -> Self {
        Self {
            id: song.id.clone(),
            title: Some(song.title.clone()),
            artist: Some(song.artist.clone()),
            image: Some(song.image.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSong {
    pub song: SimpleSong,
    pub votes: i64,
    /// Insertion order, used to break vote ties.
    pub sequence: u64,
}

/// Stored form of a session queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub songs: Vec<QueuedSong>,
    pub next_sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentlyPlaying {
    pub song: Option<SimpleSong>,
    pub playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
}

impl CurrentlyPlaying {
    pub fn song_id(&self) -> Option<&SongId> {
        self.song.as_ref().map(|s| &s.id)
    }
}

/// Immutable per-session settings written at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub admin_account_id: AccountId,
    /// 0 means no cap.
    pub maximum_voters: u32,
    pub created_at_ms: u64,
}

pub type VoterMap = BTreeMap<VoterId, Voter>;

/// Spent bonus votes: song -> account -> count.
pub type BonusLedger = BTreeMap<SongId, BTreeMap<AccountId, u32>>;

/// Composed view pushed to subscribers and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub admin_account_id: Option<AccountId>,
    pub currently_playing: CurrentlyPlaying,
    pub queue: Vec<QueuedSong>,
    pub number_of_voters: u32,
    pub maximum_voters: u32,
}
