//! Queue engine: vote accumulation, bonus votes and advancing to the next song.

mod ordering;
mod settlement;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    common::{
        errors::{SessionError, SessionResult},
        types::{AccountId, SessionId, VoterId},
    },
    session::SessionManager,
    state::models::{SimpleSong, SongUpdate},
    voter::{VoteAction, VoteDirection},
};

/// Manual playback controls available to the session admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Play,
    Pause,
    Advance,
}

impl SessionManager {
    /// Adds `vote_delta` to a song, inserting it if it is not queued yet.
    pub async fn upsert_queue(
        &self,
        session_id: SessionId,
        update: &SongUpdate,
        vote_delta: i64,
    ) -> SessionResult<()> {
        let handle = self.ensure_exists(session_id).await?;

        let applied = self
            .state()
            .update_queue(session_id, |queue| queue.upsert(update, vote_delta))
            .await;
        if applied.is_none() {
            debug!("[{}] Queue update for {} dropped", session_id, update.id);
        }

        self.send_updated_state(session_id, handle.as_deref()).await;
        Ok(())
    }

    /// Replaces the whole queue. Insertion order follows `songs`.
    pub async fn set_queue(
        &self,
        session_id: SessionId,
        songs: Vec<(SimpleSong, i64)>,
    ) -> SessionResult<()> {
        let handle = self.ensure_exists(session_id).await?;
        let count = songs.len();
        self.state()
            .update_queue(session_id, move |queue| queue.replace(songs))
            .await;
        info!("[{}] Queue replaced with {} songs", session_id, count);

        self.send_updated_state(session_id, handle.as_deref()).await;
        Ok(())
    }

    /// Moves the head of the queue into playback.
    ///
    /// With `force` the provider skips straight to it; otherwise it is only
    /// queued on the provider to follow the current track. Returns the song
    /// advanced to, or `None` when the queue was empty.
    pub async fn advance_queue(
        &self,
        session_id: SessionId,
        force: bool,
    ) -> SessionResult<Option<SimpleSong>> {
        let handle = self.handle(session_id)?;

        let Some(head) = self
            .state()
            .update_queue(session_id, |queue| queue.pop_head())
            .await
            .flatten()
        else {
            debug!("[{}] Queue empty, nothing to advance", session_id);
            return Ok(None);
        };
        let song = head.song.clone();

        if let Err(e) = handle.streaming.queue_song(&song.id).await {
            warn!("[{}] Error queueing {} on provider: {}", session_id, song.id, e);
            self.state()
                .update_queue(session_id, move |queue| queue.restore(head))
                .await;
            return Err(SessionError::Streaming(e));
        }

        if force {
            if let Err(e) = handle.streaming.advance_to_next().await {
                warn!("[{}] Error skipping to {}: {}", session_id, song.id, e);
            }
        }

        let playing = song.clone();
        self.state()
            .update_currently_playing(session_id, move |current| {
                current.song = Some(playing);
                current.playing = true;
                current.progress_ms = 0;
                current.duration_ms = 0;
            })
            .await;

        self.settle_bonus_votes(session_id, &song.id).await;
        handle.metrics.lock().record_song_played();
        info!(
            "[{}] Queue advanced to {} (forced: {})",
            session_id, song.id, force
        );

        self.send_updated_state(session_id, Some(&handle)).await;
        Ok(Some(song))
    }

    /// Records `count` bonus votes spent by `account_id` on a song. They
    /// count toward ranking right away and are charged when the song plays.
    pub async fn add_bonus_vote(
        &self,
        session_id: SessionId,
        update: &SongUpdate,
        account_id: AccountId,
        count: u32,
    ) -> SessionResult<()> {
        if count == 0 {
            return Err(SessionError::InvalidVote(
                "Bonus vote count must be positive".into(),
            ));
        }
        let handle = self.ensure_exists(session_id).await?;

        let song_id = update.id.clone();
        self.state()
            .update_bonus_votes(session_id, move |ledger| {
                *ledger
                    .entry(song_id)
                    .or_default()
                    .entry(account_id)
                    .or_default() += count;
            })
            .await;
        if let Some(handle) = &handle {
            handle.metrics.lock().record_bonus_votes(account_id, count);
        }
        debug!(
            "[{}] Account {} spent {} bonus votes on {}",
            session_id, account_id, count, update.id
        );

        self.upsert_queue(session_id, update, i64::from(count)).await
    }

    /// Applies one voter's vote to the queue.
    pub async fn cast_vote(
        &self,
        session_id: SessionId,
        voter_id: &VoterId,
        update: SongUpdate,
        direction: VoteDirection,
        action: VoteAction,
    ) -> SessionResult<()> {
        let handle = self.ensure_exists(session_id).await?;

        let voter_config = self.config().voters.clone();
        let target = voter_id.clone();
        let song_id = update.id.clone();
        let outcome = self
            .state()
            .update_voters(session_id, move |voters| -> SessionResult<_> {
                let voter = voters
                    .get_mut(&target)
                    .ok_or_else(|| SessionError::VoterNotFound(session_id, target.clone()))?;
                let outcome = voter.process_vote(&song_id, direction, action)?;
                voter.refresh_expiry(&voter_config);
                Ok((outcome, voter.account_id))
            })
            .await
            .unwrap_or_else(|| Err(SessionError::VoterNotFound(session_id, voter_id.clone())));
        let (outcome, account_id) = outcome?;

        if let Some(handle) = &handle {
            handle.metrics.lock().record_vote();
        }

        match (outcome.bonus, account_id) {
            (true, Some(account_id)) => {
                self.add_bonus_vote(session_id, &update, account_id, 1)
                    .await
            }
            _ => self.upsert_queue(session_id, &update, outcome.delta).await,
        }
    }

    pub async fn update_playback(
        &self,
        session_id: SessionId,
        action: PlaybackAction,
    ) -> SessionResult<()> {
        let handle = self.handle(session_id)?;

        let playing = match action {
            PlaybackAction::Advance => {
                self.advance_queue(session_id, true).await?;
                return Ok(());
            }
            PlaybackAction::Play => {
                handle.streaming.play().await.map_err(SessionError::Streaming)?;
                true
            }
            PlaybackAction::Pause => {
                handle.streaming.pause().await.map_err(SessionError::Streaming)?;
                false
            }
        };

        self.state()
            .update_currently_playing(session_id, move |current| current.playing = playing)
            .await;
        debug!("[{}] Playback set to {:?}", session_id, action);

        self.send_updated_state(session_id, Some(&handle)).await;
        Ok(())
    }
}
