//! Tournament aggregate: registration, bracket pairing, and standings.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Tournament lifecycle status. `Cancelled` is reachable before `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    Upcoming,
    Registration,
    Active,
    Finished,
    Cancelled,
}

impl TournamentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TournamentStatus::Finished | TournamentStatus::Cancelled)
    }

    /// Joining is open until the tournament goes active.
    pub fn accepts_registrations(self) -> bool {
        matches!(self, TournamentStatus::Upcoming | TournamentStatus::Registration)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition(self, next: TournamentStatus) -> bool {
        match (self, next) {
            (TournamentStatus::Upcoming, TournamentStatus::Registration)
            | (TournamentStatus::Upcoming, TournamentStatus::Active)
            | (TournamentStatus::Registration, TournamentStatus::Active)
            | (TournamentStatus::Active, TournamentStatus::Finished) => true,
            (from, TournamentStatus::Cancelled) => from.accepts_registrations(),
            _ => false,
        }
    }
}

/// Bracket format. Only single elimination is generated today; round
/// progression past round 1 is an explicit extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BracketType {
    SingleElimination,
    RoundRobin,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Defaults applied to battles spawned from this tournament.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSettings {
    /// Per-question time limit for spawned battles; 30s when unset.
    pub time_limit_seconds: Option<u32>,
    pub allow_spectators: bool,
    pub auto_start: bool,
}

/// One registered user. The (tournament, user) pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentParticipant {
    pub id: DbId,
    pub tournament_id: DbId,
    pub user_id: DbId,
    pub score: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub is_eliminated: bool,
    pub final_rank: Option<u32>,
}

impl TournamentParticipant {
    pub fn new(tournament_id: DbId, user_id: DbId) -> Self {
        Self {
            id: 0,
            tournament_id,
            user_id,
            score: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            is_eliminated: false,
            final_rank: None,
        }
    }
}

/// A bracket competition over one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: DbId,
    pub name: String,
    pub status: TournamentStatus,
    pub bracket_type: BracketType,
    pub max_participants: u32,
    /// Must never exceed `max_participants`, concurrent joins included.
    pub current_participants: u32,
    pub quiz_id: DbId,
    pub settings: TournamentSettings,
    pub participants: Vec<TournamentParticipant>,
    pub created_at: Timestamp,
}

impl Tournament {
    pub fn new(
        name: String,
        bracket_type: BracketType,
        max_participants: u32,
        quiz_id: DbId,
        settings: TournamentSettings,
    ) -> Self {
        Self {
            id: 0,
            name,
            status: TournamentStatus::Upcoming,
            bracket_type,
            max_participants,
            current_participants: 0,
            quiz_id,
            settings,
            participants: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }

    pub fn has_user(&self, user_id: DbId) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn participant_by_user_mut(&mut self, user_id: DbId) -> Option<&mut TournamentParticipant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }
}

// ---------------------------------------------------------------------------
// Bracket pairing
// ---------------------------------------------------------------------------

/// The pairing of one round: sequential pairs after a uniform shuffle, plus
/// the trailing participant left over from an odd field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub pairs: Vec<(DbId, DbId)>,
    pub unpaired: Option<DbId>,
}

/// Shuffle the field uniformly and pair neighbours (0-1, 2-3, ...). An odd
/// field leaves the last participant unpaired; the caller decides what to do
/// with them.
pub fn pair_participants<R: Rng + ?Sized>(rng: &mut R, user_ids: &[DbId]) -> Pairing {
    let mut shuffled = user_ids.to_vec();
    shuffled.shuffle(rng);

    let mut pairs = Vec::with_capacity(shuffled.len() / 2);
    let mut chunks = shuffled.chunks_exact(2);
    for pair in &mut chunks {
        pairs.push((pair[0], pair[1]));
    }
    let unpaired = chunks.remainder().first().copied();

    Pairing { pairs, unpaired }
}

/// Final standings: the winner takes rank 1, everyone else follows by wins,
/// then score.
pub fn assign_final_ranks(participants: &mut [TournamentParticipant], winner_user_id: DbId) {
    let mut order: Vec<usize> = (0..participants.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (&participants[a], &participants[b]);
        (pb.user_id == winner_user_id)
            .cmp(&(pa.user_id == winner_user_id))
            .then(pb.wins.cmp(&pa.wins))
            .then(pb.score.cmp(&pa.score))
    });
    for (rank, idx) in order.into_iter().enumerate() {
        participants[idx].final_rank = Some(rank as u32 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    // -----------------------------------------------------------------------
    // Pairing properties
    // -----------------------------------------------------------------------

    #[test]
    fn even_field_pairs_everyone() {
        let ids = vec![1, 2, 3, 4, 5, 6];
        let mut rng = StdRng::seed_from_u64(3);
        let pairing = pair_participants(&mut rng, &ids);

        assert_eq!(pairing.pairs.len(), 3);
        assert_eq!(pairing.unpaired, None);

        let mut seen = HashSet::new();
        for (a, b) in &pairing.pairs {
            assert_ne!(a, b);
            assert!(seen.insert(*a));
            assert!(seen.insert(*b));
        }
        assert_eq!(seen, ids.into_iter().collect());
    }

    #[test]
    fn odd_field_leaves_one_unpaired() {
        let ids = vec![1, 2, 3, 4, 5];
        let mut rng = StdRng::seed_from_u64(9);
        let pairing = pair_participants(&mut rng, &ids);

        assert_eq!(pairing.pairs.len(), 2);
        let unpaired = pairing.unpaired.expect("one participant must be left over");

        let mut seen: HashSet<DbId> = pairing.pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        assert!(seen.insert(unpaired));
        assert_eq!(seen, ids.into_iter().collect());
    }

    #[test]
    fn two_participants_form_one_pair() {
        let mut rng = StdRng::seed_from_u64(1);
        let pairing = pair_participants(&mut rng, &[7, 8]);
        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(pairing.unpaired, None);
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    #[test]
    fn registration_path_is_legal() {
        assert!(TournamentStatus::Upcoming.can_transition(TournamentStatus::Registration));
        assert!(TournamentStatus::Registration.can_transition(TournamentStatus::Active));
        assert!(TournamentStatus::Upcoming.can_transition(TournamentStatus::Active));
        assert!(TournamentStatus::Active.can_transition(TournamentStatus::Finished));
    }

    #[test]
    fn cancel_only_before_active() {
        assert!(TournamentStatus::Upcoming.can_transition(TournamentStatus::Cancelled));
        assert!(TournamentStatus::Registration.can_transition(TournamentStatus::Cancelled));
        assert!(!TournamentStatus::Active.can_transition(TournamentStatus::Cancelled));
        assert!(!TournamentStatus::Finished.can_transition(TournamentStatus::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            TournamentStatus::Upcoming,
            TournamentStatus::Registration,
            TournamentStatus::Active,
            TournamentStatus::Finished,
            TournamentStatus::Cancelled,
        ] {
            assert!(!TournamentStatus::Finished.can_transition(next));
            assert!(!TournamentStatus::Cancelled.can_transition(next));
        }
    }

    // -----------------------------------------------------------------------
    // Capacity and ranking
    // -----------------------------------------------------------------------

    #[test]
    fn capacity_check() {
        let mut t = Tournament::new(
            "cup".into(),
            BracketType::SingleElimination,
            2,
            1,
            TournamentSettings::default(),
        );
        assert!(!t.is_full());
        t.current_participants = 2;
        assert!(t.is_full());
    }

    #[test]
    fn final_ranks_put_the_winner_first() {
        let mut participants: Vec<TournamentParticipant> = [(10, 1), (20, 2), (30, 0)]
            .into_iter()
            .map(|(user, wins)| {
                let mut p = TournamentParticipant::new(1, user);
                p.wins = wins;
                p
            })
            .collect();

        assign_final_ranks(&mut participants, 10);

        let rank_of = |user: DbId| {
            participants
                .iter()
                .find(|p| p.user_id == user)
                .and_then(|p| p.final_rank)
                .unwrap()
        };
        assert_eq!(rank_of(10), 1);
        assert_eq!(rank_of(20), 2);
        assert_eq!(rank_of(30), 3);
    }
}
