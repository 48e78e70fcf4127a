//! Game session aggregate: the lobby, the question loop, and its players.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Seconds a question stays open for answers.
pub const QUESTION_SECONDS: u64 = 15;

/// Seconds the correct answer stays on screen before the leaderboard.
pub const REVEAL_SECONDS: u64 = 15;

/// Seconds the leaderboard stays up before the next question is sent.
pub const LEADERBOARD_SECONDS: u64 = 5;

/// Inclusive pin range: six digits, no leading zero.
const PIN_MIN: u32 = 100_000;
const PIN_MAX: u32 = 999_999;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Game session lifecycle status. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Lobby,
    Active,
    Finished,
}

impl SessionStatus {
    /// Whether `next` is a legal transition from this status.
    pub fn can_transition(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Lobby, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Finished)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished)
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// One recorded answer of a session player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnswer {
    pub question_id: DbId,
    pub answer: String,
    pub is_correct: bool,
    pub response_time_ms: u64,
}

/// A player who joined a session. Anonymous play is allowed, so `user_id`
/// is optional. Players are never deleted mid-game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: DbId,
    pub nickname: String,
    pub score: i32,
    pub user_id: Option<DbId>,
    pub answers: Vec<PlayerAnswer>,
}

/// A live game session identified by its six-digit pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: DbId,
    pub pin: String,
    pub quiz_id: DbId,
    pub status: SessionStatus,
    /// Index of the question currently on screen; -1 before the first one.
    pub current_question_index: i32,
    pub players: Vec<Player>,
    pub created_at: Timestamp,
}

impl GameSession {
    /// A fresh lobby. The store assigns the id on create.
    pub fn new_lobby(quiz_id: DbId, pin: String) -> Self {
        Self {
            id: 0,
            pin,
            quiz_id,
            status: SessionStatus::Lobby,
            current_question_index: -1,
            players: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Nicknames are unique within a session.
    pub fn has_nickname(&self, nickname: &str) -> bool {
        self.players.iter().any(|p| p.nickname == nickname)
    }

    pub fn player_mut(&mut self, player_id: DbId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Draw a uniform six-digit pin. Collision retry against live sessions is
/// the engine's job.
pub fn generate_pin<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.random_range(PIN_MIN..=PIN_MAX).to_string()
}

/// Players ordered for the leaderboard: descending score, stable on ties.
pub fn rank_players(players: &[Player]) -> Vec<Player> {
    let mut ranked = players.to_vec();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
