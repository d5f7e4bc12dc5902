//! Session engine for collaboratively voted listening queues.
//!
//! A [`SessionManager`] owns every live session on this process. Session
//! state lives behind a [`StateStore`], so several processes may share one
//! backend; per-session watchers keep the provider's playback and the vote
//! queue in step and prune idle voters, and a global reaper ends idle
//! sessions.

pub mod broadcast;
pub mod common;
pub mod configs;
pub mod queue;
pub mod services;
pub mod session;
pub mod state;
pub mod store;
pub mod voter;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use common::{
    errors::{ServiceError, SessionError, SessionResult, Severity, StoreError},
    types::{AccountId, SessionId, SongId, VoterId},
};
pub use configs::Config;
pub use queue::PlaybackAction;
pub use services::{AccountService, AccountTier, MemoryMetricsSink, MetricsSink, StreamingService};
pub use session::{SessionManager, SessionMetrics};
pub use state::models::{QueuedSong, SessionSnapshot, SimpleSong, SongUpdate};
pub use store::{MemoryStore, StateStore};
pub use voter::{VoteAction, VoteDirection, Voter, VoterType};
