use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_timeout_minutes")]
    pub timeout_minutes: u64,
    /// Voter cap for sessions whose admin is on the free tier.
    #[serde(default = "default_free_tier_max_voters")]
    pub free_tier_max_voters: u32,
    /// How many random ids to try before giving up on creation.
    #[serde(default = "default_id_attempts")]
    pub id_attempts: usize,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_session_timeout_minutes(),
            free_tier_max_voters: default_free_tier_max_voters(),
            id_attempts: default_id_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    #[serde(default = "default_streaming_slow_interval_ms")]
    pub streaming_slow_interval_ms: u64,
    #[serde(default = "default_streaming_fast_interval_ms")]
    pub streaming_fast_interval_ms: u64,
    /// Remaining track time under which the streaming watcher polls fast.
    #[serde(default = "default_fast_window_ms")]
    pub fast_window_ms: u64,
    /// Remaining track time under which the next song is handed to the provider.
    #[serde(default = "default_advance_threshold_ms")]
    pub advance_threshold_ms: u64,
    #[serde(default = "default_voter_interval_ms")]
    pub voter_interval_ms: u64,
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,
}

impl WatcherConfig {
    pub fn streaming_slow_interval(&self) -> Duration {
        Duration::from_millis(self.streaming_slow_interval_ms)
    }

    pub fn streaming_fast_interval(&self) -> Duration {
        Duration::from_millis(self.streaming_fast_interval_ms)
    }

    pub fn voter_interval(&self) -> Duration {
        Duration::from_millis(self.voter_interval_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            streaming_slow_interval_ms: default_streaming_slow_interval_ms(),
            streaming_fast_interval_ms: default_streaming_fast_interval_ms(),
            fast_window_ms: default_fast_window_ms(),
            advance_threshold_ms: default_advance_threshold_ms(),
            voter_interval_ms: default_voter_interval_ms(),
            reaper_interval_ms: default_reaper_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoterConfig {
    #[serde(default = "default_voter_timeout_minutes")]
    pub regular_timeout_minutes: u64,
    #[serde(default = "default_voter_timeout_minutes")]
    pub super_timeout_minutes: u64,
}

impl VoterConfig {
    pub fn regular_timeout(&self) -> Duration {
        Duration::from_secs(self.regular_timeout_minutes * 60)
    }

    pub fn super_timeout(&self) -> Duration {
        Duration::from_secs(self.super_timeout_minutes * 60)
    }
}

impl Default for VoterConfig {
    fn default() -> Self {
        Self {
            regular_timeout_minutes: default_voter_timeout_minutes(),
            super_timeout_minutes: default_voter_timeout_minutes(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BroadcastConfig {
    /// How long a subscriber may take to accept an update before it is dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl BroadcastConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_session_timeout_minutes() -> u64 {
    30
}

fn default_free_tier_max_voters() -> u32 {
    50
}

fn default_id_attempts() -> usize {
    32
}

fn default_streaming_slow_interval_ms() -> u64 {
    2000
}

fn default_streaming_fast_interval_ms() -> u64 {
    250
}

fn default_fast_window_ms() -> u64 {
    10_000
}

fn default_advance_threshold_ms() -> u64 {
    5000
}

fn default_voter_interval_ms() -> u64 {
    1000
}

fn default_reaper_interval_ms() -> u64 {
    10_000
}

fn default_voter_timeout_minutes() -> u64 {
    15
}

fn default_send_timeout_ms() -> u64 {
    50
}

fn default_channel_capacity() -> usize {
    16
}

fn default_lock_timeout_ms() -> u64 {
    5000
}
