use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    common::types::{AccountId, SessionId, VoterId, now_ms},
    voter::VoterType,
};

/// Aggregate counters kept for a session and retained after it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub session_id: SessionId,
    pub admin_account_id: AccountId,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub number_of_votes: u64,
    pub number_of_voters: u64,
    pub number_of_songs_played: u64,
    pub number_of_bonus_votes_added: u64,
    pub number_of_super_voters: u64,
    pub number_of_bonus_voters: u64,
    #[serde(skip)]
    voters_seen: HashSet<VoterId>,
    #[serde(skip)]
    super_voters_seen: HashSet<VoterId>,
    #[serde(skip)]
    bonus_voters_seen: HashSet<AccountId>,
}

impl SessionMetrics {
    pub fn new(session_id: SessionId, admin_account_id: AccountId) -> Self {
        Self {
            session_id,
            admin_account_id,
            started_at_ms: now_ms(),
            ended_at_ms: None,
            number_of_votes: 0,
            number_of_voters: 0,
            number_of_songs_played: 0,
            number_of_bonus_votes_added: 0,
            number_of_super_voters: 0,
            number_of_bonus_voters: 0,
            voters_seen: HashSet::new(),
            super_voters_seen: HashSet::new(),
            bonus_voters_seen: HashSet::new(),
        }
    }

    pub fn record_voter(&mut self, voter_id: &VoterId, voter_type: VoterType) {
        if self.voters_seen.insert(voter_id.clone()) {
            self.number_of_voters += 1;
        }
        if voter_type == VoterType::Super && self.super_voters_seen.insert(voter_id.clone()) {
            self.number_of_super_voters += 1;
        }
    }

    pub fn record_vote(&mut self) {
        self.number_of_votes += 1;
    }

    pub fn record_bonus_votes(&mut self, account_id: AccountId, count: u32) {
        self.number_of_bonus_votes_added += u64::from(count);
        if self.bonus_voters_seen.insert(account_id) {
            self.number_of_bonus_voters += 1;
        }
    }

    pub fn record_song_played(&mut self) {
        self.number_of_songs_played += 1;
    }

    pub fn finish(&mut self) {
        self.ended_at_ms.get_or_insert_with(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_counters() {
        let mut metrics = SessionMetrics::new(SessionId(100000), AccountId(1));
        let v1 = VoterId::from("v1");
        let v2 = VoterId::from("v2");

        metrics.record_voter(&v1, VoterType::Regular);
        metrics.record_voter(&v1, VoterType::Regular);
        metrics.record_voter(&v2, VoterType::Super);
        metrics.record_voter(&v2, VoterType::Super);
        metrics.record_bonus_votes(AccountId(9), 3);
        metrics.record_bonus_votes(AccountId(9), 2);

        assert_eq!(metrics.number_of_voters, 2);
        assert_eq!(metrics.number_of_super_voters, 1);
        assert_eq!(metrics.number_of_bonus_votes_added, 5);
        assert_eq!(metrics.number_of_bonus_voters, 1);
    }

    #[test]
    fn test_finish_stamps_once() {
        let mut metrics = SessionMetrics::new(SessionId(100000), AccountId(1));
        metrics.finish();
        let ended = metrics.ended_at_ms;
        assert!(ended.is_some());
        metrics.finish();
        assert_eq!(metrics.ended_at_ms, ended);
    }

    #[test]
    fn test_serialized_form_hides_bookkeeping() {
        let metrics = SessionMetrics::new(SessionId(100000), AccountId(1));
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json.get("votersSeen").is_none());
        assert_eq!(json["numberOfVotes"], 0);
    }
}
