use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    common::types::SongId,
    session::{SessionHandle, SessionManager},
};

/// What the previous poll saw on the provider.
#[derive(Debug, Default)]
pub(crate) struct WatchState {
    last_track: Option<SongId>,
    last_playing: bool,
    /// A new track started and its successor has not been queued yet.
    add_next_pending: bool,
}

pub async fn run(manager: Arc<SessionManager>, handle: Arc<SessionHandle>) {
    let session_id = handle.id;
    let mut watch = WatchState::default();
    debug!("[{}] Streaming watcher started", session_id);

    loop {
        if manager.state().is_expired(session_id).await {
            info!("[{}] Session expired, stopping streaming watcher", session_id);
            return;
        }

        let delay = poll_once(&manager, &handle, &mut watch).await;

        tokio::select! {
            _ = handle.cancelled() => {
                debug!("[{}] Streaming watcher stopped", session_id);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// One poll of the provider. Returns how long to wait before the next one.
pub(crate) async fn poll_once(
    manager: &SessionManager,
    handle: &SessionHandle,
    watch: &mut WatchState,
) -> Duration {
    let session_id = handle.id;
    let config = &manager.config().watchers;

    let current = match handle.streaming.current_song().await {
        Ok(current) => current,
        Err(e) => {
            warn!("[{}] Error getting current song: {}", session_id, e);
            return config.streaming_slow_interval();
        }
    };
    let remaining_ms = match handle.streaming.time_remaining().await {
        Ok(remaining_ms) => remaining_ms,
        Err(e) => {
            warn!("[{}] Error getting time remaining: {}", session_id, e);
            return config.streaming_slow_interval();
        }
    };

    let mut changed = false;
    let track = current.song.as_ref().map(|song| song.id.clone());
    if track != watch.last_track {
        debug!("[{}] Track changed to {:?}", session_id, track);
        watch.add_next_pending = track.is_some();
        watch.last_track = track;
        changed = true;
    }
    if current.is_playing != watch.last_playing {
        watch.last_playing = current.is_playing;
        changed = true;
    }

    if changed {
        let observed = current.to_currently_playing();
        manager
            .state()
            .update_currently_playing(session_id, move |playing| *playing = observed)
            .await;
    }

    // A successful advance broadcasts on its own.
    let mut broadcast = changed;
    if watch.add_next_pending && remaining_ms < config.advance_threshold_ms {
        watch.add_next_pending = false;
        match manager.advance_queue(session_id, false).await {
            Ok(Some(song)) => {
                debug!("[{}] Queued {} to play next", session_id, song.id);
                broadcast = false;
            }
            Ok(None) => debug!("[{}] Nothing queued to play next", session_id),
            Err(e) => warn!("[{}] Error advancing queue: {}", session_id, e),
        }
    }
    if broadcast {
        manager.send_updated_state(session_id, Some(handle)).await;
    }

    if remaining_ms <= config.fast_window_ms {
        config.streaming_fast_interval()
    } else {
        config.streaming_slow_interval()
    }
}
