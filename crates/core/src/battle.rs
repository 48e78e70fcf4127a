//! Battle aggregate: a timed 1v1 contest over a fixed question snapshot.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::quiz::{QuestionOption, QuizQuestion};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Per-question time limit applied when the tournament does not set one.
pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 30;

/// Questions per battle, or fewer if the quiz has less.
pub const DEFAULT_QUESTION_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Battle lifecycle status. `Cancelled` is reachable from any non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleStatus {
    Scheduled,
    Waiting,
    Active,
    Finished,
    Cancelled,
}

impl BattleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BattleStatus::Finished | BattleStatus::Cancelled)
    }

    /// Only scheduled or waiting battles may start.
    pub fn can_start(self) -> bool {
        matches!(self, BattleStatus::Scheduled | BattleStatus::Waiting)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition(self, next: BattleStatus) -> bool {
        match (self, next) {
            (BattleStatus::Scheduled, BattleStatus::Waiting)
            | (BattleStatus::Scheduled, BattleStatus::Active)
            | (BattleStatus::Waiting, BattleStatus::Active)
            | (BattleStatus::Active, BattleStatus::Finished) => true,
            (from, BattleStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// How a battle came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleType {
    Tournament,
    Friendly,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Battle settings, copied from the owning tournament at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSettings {
    pub time_limit_seconds: u32,
    pub questions_count: u32,
    pub allow_spectators: bool,
    pub auto_start: bool,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            questions_count: DEFAULT_QUESTION_COUNT as u32,
            allow_spectators: true,
            auto_start: false,
        }
    }
}

/// One recorded answer of a battle participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleAnswer {
    pub question_id: DbId,
    pub answer: String,
    pub is_correct: bool,
    pub response_time_ms: u64,
}

/// One of the exactly two contestants of a battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleParticipant {
    pub id: DbId,
    pub battle_id: DbId,
    pub user_id: DbId,
    pub score: i32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub average_response_time_ms: f64,
    pub is_ready: bool,
    pub answers: Vec<BattleAnswer>,
}

impl BattleParticipant {
    /// A fresh contestant with a zeroed scoreboard. Ids are assigned by the
    /// store on battle create.
    pub fn new(user_id: DbId) -> Self {
        Self {
            id: 0,
            battle_id: 0,
            user_id,
            score: 0,
            questions_answered: 0,
            correct_answers: 0,
            average_response_time_ms: 0.0,
            is_ready: false,
            answers: Vec::new(),
        }
    }

    pub fn has_answered(&self, question_id: DbId) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }
}

/// A question snapshotted from the source quiz at battle creation. Later
/// edits to the quiz must not affect an in-progress battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleQuestion {
    pub id: DbId,
    pub battle_id: DbId,
    pub question_text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: String,
    /// 1-based, unique within the battle.
    pub order: u32,
    pub time_limit: u32,
    pub asked_at: Option<Timestamp>,
    pub answered_at: Option<Timestamp>,
}

/// Per-player breakdown written into the results at battle end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub user_id: DbId,
    pub score: i32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub average_response_time_ms: f64,
}

/// Final results, populated only when the battle reaches `Finished`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResults {
    pub winner_id: Option<DbId>,
    pub loser_id: Option<DbId>,
    pub is_draw: bool,
    pub player1_score: i32,
    pub player2_score: i32,
    pub stats: Vec<ParticipantStats>,
}

/// A head-to-head contest. Owns its two participants and its question
/// snapshot; optionally references the tournament that spawned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    pub id: DbId,
    pub name: String,
    pub status: BattleStatus,
    pub battle_type: BattleType,
    pub quiz_id: DbId,
    pub tournament_id: Option<DbId>,
    pub round: Option<u32>,
    pub settings: BattleSettings,
    pub participants: Vec<BattleParticipant>,
    pub questions: Vec<BattleQuestion>,
    pub results: Option<BattleResults>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl Battle {
    pub fn participant_by_user(&self, user_id: DbId) -> Option<&BattleParticipant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_by_user_mut(&mut self, user_id: DbId) -> Option<&mut BattleParticipant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn question_by_order(&self, order: u32) -> Option<&BattleQuestion> {
        self.questions.iter().find(|q| q.order == order)
    }

    pub fn question_by_order_mut(&mut self, order: u32) -> Option<&mut BattleQuestion> {
        self.questions.iter_mut().find(|q| q.order == order)
    }

    /// The 1-based order of the in-flight question: one past the furthest
    /// participant, capped at the last question.
    pub fn current_question_order(&self) -> u32 {
        let furthest = self
            .participants
            .iter()
            .map(|p| p.questions_answered)
            .max()
            .unwrap_or(0);
        (furthest + 1).clamp(1, self.questions.len().max(1) as u32)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Outcome of comparing the two final scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    Winner { winner_user_id: DbId, loser_user_id: DbId },
    Draw,
}

/// Strictly higher score wins; equal scores are a draw.
pub fn decide_winner(p1: &BattleParticipant, p2: &BattleParticipant) -> BattleOutcome {
    use std::cmp::Ordering;

    match p1.score.cmp(&p2.score) {
        Ordering::Greater => BattleOutcome::Winner {
            winner_user_id: p1.user_id,
            loser_user_id: p2.user_id,
        },
        Ordering::Less => BattleOutcome::Winner {
            winner_user_id: p2.user_id,
            loser_user_id: p1.user_id,
        },
        Ordering::Equal => BattleOutcome::Draw,
    }
}

/// Uniform random subset of `min(count, available)` questions, without
/// replacement.
pub fn select_questions<'a, R: Rng + ?Sized>(
    rng: &mut R,
    source: &'a [QuizQuestion],
    count: usize,
) -> Vec<&'a QuizQuestion> {
    source.choose_multiple(rng, count.min(source.len())).collect()
}

/// Remaining seconds for the in-flight question: the time budget through
/// `current_order` questions minus the elapsed battle time, floored at 0 and
/// capped at one question's limit.
pub fn remaining_seconds(
    time_limit: u32,
    started_at: Timestamp,
    now: Timestamp,
    current_order: u32,
) -> u32 {
    let elapsed = (now - started_at).num_seconds().max(0) as u64;
    let budget = u64::from(time_limit) * u64::from(current_order);
    budget.saturating_sub(elapsed).min(u64::from(time_limit)) as u32
}
