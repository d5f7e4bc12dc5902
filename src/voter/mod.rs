//! Session participants and the vote arithmetic applied on their behalf.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    common::{
        errors::{SessionError, SessionResult},
        types::{AccountId, SongId, VoterId, now_ms},
    },
    configs::VoterConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterType {
    Admin,
    Regular,
    Super,
}

impl VoterType {
    /// Votes one up-vote is worth.
    pub fn weight(self) -> i64 {
        match self {
            Self::Super => 2,
            Self::Admin | Self::Regular => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Add,
    Remove,
}

/// Effect of one vote on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub delta: i64,
    /// The vote was paid for with one of the voter's bonus votes.
    pub bonus: bool,
}

impl VoteOutcome {
    fn plain(delta: i64) -> Self {
        Self {
            delta,
            bonus: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: VoterId,
    pub account_id: Option<AccountId>,
    pub voter_type: VoterType,
    /// Ignored for admins, who never expire.
    pub expires_at_ms: u64,
    #[serde(default)]
    pub songs_up_voted: BTreeSet<SongId>,
    #[serde(default)]
    pub songs_down_voted: BTreeSet<SongId>,
    /// Bonus votes still available to spend.
    #[serde(default)]
    pub bonus_votes: u32,
}

impl Voter {
    pub fn new(
        id: VoterId,
        account_id: Option<AccountId>,
        voter_type: VoterType,
        bonus_votes: u32,
        config: &VoterConfig,
    ) -> Self {
        let mut voter = Self {
            id,
            account_id,
            voter_type,
            expires_at_ms: 0,
            songs_up_voted: BTreeSet::new(),
            songs_down_voted: BTreeSet::new(),
            bonus_votes,
        };
        voter.refresh_expiry(config);
        voter
    }

    /// The permanent voter registered for a session's admin account.
    pub fn admin(account_id: AccountId) -> Self {
        Self {
            id: VoterId(account_id.to_string()),
            account_id: Some(account_id),
            voter_type: VoterType::Admin,
            expires_at_ms: u64::MAX,
            songs_up_voted: BTreeSet::new(),
            songs_down_voted: BTreeSet::new(),
            bonus_votes: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.voter_type == VoterType::Admin
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        !self.is_admin() && now_ms > self.expires_at_ms
    }

    pub fn refresh_expiry(&mut self, config: &VoterConfig) {
        let ttl = match self.voter_type {
            VoterType::Admin => {
                self.expires_at_ms = u64::MAX;
                return;
            }
            VoterType::Regular => config.regular_timeout(),
            VoterType::Super => config.super_timeout(),
        };
        self.expires_at_ms = now_ms().saturating_add(ttl.as_millis() as u64);
    }

    /// Applies a vote to this voter's history and returns the queue delta.
    pub fn process_vote(
        &mut self,
        song: &SongId,
        direction: VoteDirection,
        action: VoteAction,
    ) -> SessionResult<VoteOutcome> {
        match (action, direction) {
            (VoteAction::Add, VoteDirection::Up) => self.add_up_vote(song),
            (VoteAction::Add, VoteDirection::Down) => self.add_down_vote(song),
            (VoteAction::Remove, VoteDirection::Up) => {
                self.songs_up_voted.remove(song);
                Ok(VoteOutcome::plain(-self.voter_type.weight()))
            }
            (VoteAction::Remove, VoteDirection::Down) => {
                self.songs_down_voted.remove(song);
                Ok(VoteOutcome::plain(1))
            }
        }
    }

    fn add_up_vote(&mut self, song: &SongId) -> SessionResult<VoteOutcome> {
        let mut adjustment = 0;
        if !self.is_admin() {
            if self.songs_up_voted.contains(song) {
                if self.bonus_votes == 0 {
                    return Err(SessionError::InvalidVote(
                        "You've already voted for this song!".into(),
                    ));
                }
                self.bonus_votes -= 1;
                return Ok(VoteOutcome {
                    delta: 1,
                    bonus: true,
                });
            }

            // Flipping a down-vote also cancels it.
            if self.songs_down_voted.contains(song) {
                adjustment = 1;
            }
        }

        self.songs_down_voted.remove(song);
        self.songs_up_voted.insert(song.clone());
        Ok(VoteOutcome::plain(adjustment + self.voter_type.weight()))
    }

    fn add_down_vote(&mut self, song: &SongId) -> SessionResult<VoteOutcome> {
        let mut adjustment = 0;
        if !self.is_admin() {
            if self.songs_down_voted.contains(song) {
                return Err(SessionError::InvalidVote(
                    "You've already voted for this song!".into(),
                ));
            }

            if self.songs_up_voted.contains(song) {
                adjustment = self.voter_type.weight();
            }
        }

        self.songs_up_voted.remove(song);
        self.songs_down_voted.insert(song.clone());
        Ok(VoteOutcome::plain(-(adjustment + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular() -> Voter {
        Voter::new(
            VoterId::from("v1"),
            None,
            VoterType::Regular,
            0,
            &VoterConfig::default(),
        )
    }

    fn song(id: &str) -> SongId {
        SongId::from(id)
    }

    #[test]
    fn test_up_vote_counts_weight() {
        let mut voter = regular();
        let outcome = voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        assert_eq!(outcome, VoteOutcome::plain(1));

        let mut super_voter = Voter::new(
            VoterId::from("v2"),
            None,
            VoterType::Super,
            0,
            &VoterConfig::default(),
        );
        let outcome = super_voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        assert_eq!(outcome.delta, 2);
    }

    #[test]
    fn test_repeat_up_vote_needs_bonus() {
        let mut voter = regular();
        voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        let err = voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidVote(_)));

        voter.bonus_votes = 2;
        let outcome = voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        assert_eq!(
            outcome,
            VoteOutcome {
                delta: 1,
                bonus: true
            }
        );
        assert_eq!(voter.bonus_votes, 1);
    }

    #[test]
    fn test_flipping_votes() {
        let mut voter = regular();
        let down = voter
            .process_vote(&song("a"), VoteDirection::Down, VoteAction::Add)
            .unwrap();
        assert_eq!(down.delta, -1);

        let up = voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        assert_eq!(up.delta, 2);
        assert!(voter.songs_up_voted.contains(&song("a")));
        assert!(!voter.songs_down_voted.contains(&song("a")));

        let down = voter
            .process_vote(&song("a"), VoteDirection::Down, VoteAction::Add)
            .unwrap();
        assert_eq!(down.delta, -2);
    }

    #[test]
    fn test_removing_votes() {
        let mut voter = regular();
        voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
            .unwrap();
        let removed = voter
            .process_vote(&song("a"), VoteDirection::Up, VoteAction::Remove)
            .unwrap();
        assert_eq!(removed.delta, -1);
        assert!(voter.songs_up_voted.is_empty());

        let removed = voter
            .process_vote(&song("b"), VoteDirection::Down, VoteAction::Remove)
            .unwrap();
        assert_eq!(removed.delta, 1);
    }

    #[test]
    fn test_admin_may_vote_repeatedly_and_never_expires() {
        let mut admin = Voter::admin(AccountId(123));
        for _ in 0..3 {
            let outcome = admin
                .process_vote(&song("a"), VoteDirection::Up, VoteAction::Add)
                .unwrap();
            assert_eq!(outcome.delta, 1);
        }
        assert!(!admin.is_expired(u64::MAX));
        assert_eq!(admin.id, VoterId::from("123"));
    }

    #[test]
    fn test_expiry() {
        let mut voter = regular();
        assert!(!voter.is_expired(now_ms()));
        voter.expires_at_ms = now_ms() - 1;
        assert!(voter.is_expired(now_ms()));

        voter.refresh_expiry(&VoterConfig::default());
        assert!(voter.expires_at_ms > now_ms() + 14 * 60 * 1000);
    }
}
