use crate::common::types::SessionId;

/// The independently locked pieces of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Config,
    Queue,
    Voters,
    VoterCount,
    CurrentlyPlaying,
    BonusVotes,
    Expiry,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Config,
        EntityKind::Queue,
        EntityKind::Voters,
        EntityKind::VoterCount,
        EntityKind::CurrentlyPlaying,
        EntityKind::BonusVotes,
        EntityKind::Expiry,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Config => "session-config",
            Self::Queue => "queue",
            Self::Voters => "voters",
            Self::VoterCount => "voter-count",
            Self::CurrentlyPlaying => "currently-playing",
            Self::BonusVotes => "bonus-vote",
            Self::Expiry => "expiry",
        }
    }
}

/// Deterministic address of one entity of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub kind: EntityKind,
    pub session_id: SessionId,
}

impl StoreKey {
    pub fn new(kind: EntityKind, session_id: SessionId) -> Self {
        Self { kind, session_id }
    }

    pub fn value_key(&self) -> String {
        format!("{}-{}", self.kind.prefix(), self.session_id)
    }

    pub fn lock_key(&self) -> String {
        format!("{}-mutex-{}", self.kind.prefix(), self.session_id)
    }

    /// Every key of a session, in [`EntityKind::ALL`] order.
    pub fn all(session_id: SessionId) -> impl Iterator<Item = StoreKey> {
        EntityKind::ALL
            .into_iter()
            .map(move |kind| StoreKey::new(kind, session_id))
    }
}
