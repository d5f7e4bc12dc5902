use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    common::types::{SessionId, SongId},
    session::SessionManager,
};

impl SessionManager {
    /// Charges the accounts that spent bonus votes on a song that has just
    /// been advanced. The ledger entry is taken under its lock so each vote
    /// is charged once; a failed charge is logged and not retried.
    pub(crate) async fn settle_bonus_votes(&self, session_id: SessionId, song_id: &SongId) -> usize {
        let target = song_id.clone();
        let spent = self
            .state()
            .update_bonus_votes(session_id, move |ledger| ledger.remove(&target))
            .await
            .flatten()
            .unwrap_or_default();
        if spent.is_empty() {
            return 0;
        }

        let results = join_all(spent.into_iter().map(|(account_id, count)| async move {
            let result = self.accounts().subtract_bonus_votes(account_id, count).await;
            if let Err(e) = &result {
                warn!(
                    "[{}] Error subtracting {} bonus votes from account {}: {}",
                    session_id, count, account_id, e
                );
            }
            result.is_ok()
        }))
        .await;

        let settled = results.iter().filter(|ok| **ok).count();
        debug!(
            "[{}] Settled bonus votes for {} on {}/{} accounts",
            session_id,
            song_id,
            settled,
            results.len()
        );
        settled
    }
}
