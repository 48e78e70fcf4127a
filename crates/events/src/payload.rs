//! Wire payloads broadcast to rooms.
//!
//! [`RoomEvent`] is the tagged union of every event a subscriber can see.
//! Wire names are part of the protocol: game events use snake_case, battle
//! and tournament events use kebab-case, and field names are camelCase.

use serde::{Deserialize, Serialize};

use quizlive_core::battle::BattleStatus;
use quizlive_core::quiz::QuizQuestion;
use quizlive_core::session::Player;
use quizlive_core::types::DbId;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A player as shown on player lists and leaderboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: DbId,
    pub nickname: String,
    pub score: i32,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            nickname: player.nickname.clone(),
            score: player.score,
        }
    }
}

/// A question as players are allowed to see it: option texts only, the
/// correct flag never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: DbId,
    pub text: String,
    pub options: Vec<String>,
}

impl From<&QuizQuestion> for QuestionView {
    fn from(question: &QuizQuestion) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.option_texts(),
        }
    }
}

/// One battle as shown on a tournament bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketBattleView {
    pub battle_id: DbId,
    pub round: u32,
    pub player1_id: DbId,
    pub player2_id: DbId,
    pub status: BattleStatus,
}

// ---------------------------------------------------------------------------
// RoomEvent
// ---------------------------------------------------------------------------

/// Everything that can be broadcast to a room, tagged with its wire name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    // --- Game room (per pin) ---
    #[serde(rename = "update_player_list")]
    PlayerList { players: Vec<PlayerView> },

    #[serde(rename = "game_started")]
    GameStarted,

    #[serde(rename = "new_question", rename_all = "camelCase")]
    NewQuestion {
        question: QuestionView,
        question_number: u32,
        total_questions: u32,
    },

    #[serde(rename = "question_timeout", rename_all = "camelCase")]
    QuestionTimeout {
        correct_answer: String,
        question_id: DbId,
    },

    #[serde(rename = "show_leaderboard")]
    ShowLeaderboard { players: Vec<PlayerView> },

    #[serde(rename = "game_finished")]
    GameFinished { players: Vec<PlayerView> },

    #[serde(rename = "game_error")]
    GameError { message: String },

    // --- Battle room (per battle id) ---
    #[serde(rename = "battle-started", rename_all = "camelCase")]
    BattleStarted { battle_id: DbId },

    #[serde(rename = "battle-update", rename_all = "camelCase")]
    BattleUpdate {
        status: BattleStatus,
        player1_score: i32,
        player2_score: i32,
        current_question: Option<u32>,
        time_remaining: Option<u32>,
        winner_id: Option<DbId>,
    },

    #[serde(rename = "score-update", rename_all = "camelCase")]
    ScoreUpdate {
        player1_score: i32,
        player2_score: i32,
    },

    #[serde(rename = "question-update", rename_all = "camelCase")]
    QuestionUpdate {
        question_number: u32,
        time_remaining: u32,
    },

    #[serde(rename = "battle-ended", rename_all = "camelCase")]
    BattleEnded { winner_id: Option<DbId> },

    #[serde(rename = "chat-message", rename_all = "camelCase")]
    ChatMessage { user_id: DbId, message: String },

    #[serde(rename = "battle-action", rename_all = "camelCase")]
    BattleAction {
        user_id: DbId,
        action: serde_json::Value,
    },

    // --- Tournament room (per tournament id) ---
    #[serde(rename = "bracket-update")]
    BracketUpdate { battles: Vec<BracketBattleView> },

    #[serde(rename = "tournament-started", rename_all = "camelCase")]
    TournamentStarted { tournament_id: DbId },

    #[serde(rename = "tournament-ended", rename_all = "camelCase")]
    TournamentEnded { winner_id: Option<DbId> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizlive_core::quiz::QuestionOption;

    #[test]
    fn new_question_wire_format() {
        let event = RoomEvent::NewQuestion {
            question: QuestionView {
                id: 7,
                text: "Largest planet?".into(),
                options: vec!["Mars".into(), "Jupiter".into()],
            },
            question_number: 1,
            total_questions: 3,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "new_question");
        assert_eq!(json["questionNumber"], 1);
        assert_eq!(json["totalQuestions"], 3);
        assert_eq!(json["question"]["options"][1], "Jupiter");
    }

    #[test]
    fn question_view_withholds_correct_flag() {
        let question = QuizQuestion {
            id: 1,
            text: "Q".into(),
            options: vec![
                QuestionOption {
                    text: "a".into(),
                    is_correct: false,
                },
                QuestionOption {
                    text: "b".into(),
                    is_correct: true,
                },
            ],
        };

        let json = serde_json::to_value(QuestionView::from(&question)).unwrap();
        assert_eq!(json["options"], serde_json::json!(["a", "b"]));
        assert!(json.get("isCorrect").is_none());
    }

    #[test]
    fn battle_events_use_kebab_case_names() {
        let json = serde_json::to_value(RoomEvent::ScoreUpdate {
            player1_score: 10,
            player2_score: 0,
        })
        .unwrap();
        assert_eq!(json["type"], "score-update");
        assert_eq!(json["player1Score"], 10);

        let json = serde_json::to_value(RoomEvent::BattleEnded { winner_id: Some(10) }).unwrap();
        assert_eq!(json["type"], "battle-ended");
        assert_eq!(json["winnerId"], 10);
    }

    #[test]
    fn unit_events_carry_only_their_tag() {
        let json = serde_json::to_value(RoomEvent::GameStarted).unwrap();
        assert_eq!(json, serde_json::json!({"type": "game_started"}));
    }

    #[test]
    fn events_roundtrip_through_json() {
        let event = RoomEvent::TournamentEnded { winner_id: Some(42) };
        let json = serde_json::to_string(&event).unwrap();
        let back: RoomEvent = serde_json::from_str(&json).unwrap();
        match back {
            RoomEvent::TournamentEnded { winner_id } => assert_eq!(winner_id, Some(42)),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
