//! Shared fixtures for the engine scenario tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use quizlive_core::quiz::{QuestionOption, QuizQuestion};
use quizlive_core::session::{GameSession, Player};
use quizlive_core::tournament::{BracketType, Tournament, TournamentParticipant, TournamentSettings};
use quizlive_core::types::DbId;
use quizlive_engine::tournament::CreateTournament;
use quizlive_engine::{ActionOutcome, ClientAction, EngineConfig, Orchestrator};
use quizlive_events::RoomEvent;
use quizlive_store::MemoryStore;

/// A quiz whose question `i` has the correct answer `right-i`.
pub fn quiz_questions(count: usize) -> Vec<QuizQuestion> {
    (1..=count)
        .map(|i| QuizQuestion {
            id: 0,
            text: format!("Question {i}"),
            options: vec![
                QuestionOption {
                    text: format!("right-{i}"),
                    is_correct: true,
                },
                QuestionOption {
                    text: format!("wrong-{i}"),
                    is_correct: false,
                },
            ],
        })
        .collect()
}

/// Orchestrator over a fresh memory store seeded with one quiz.
pub async fn harness(question_count: usize) -> (Orchestrator, Arc<MemoryStore>, DbId) {
    quizlive_engine::telemetry::init();
    let store = Arc::new(MemoryStore::new());
    let quiz_id = store.insert_quiz(quiz_questions(question_count)).await;
    let orchestrator = Orchestrator::with_memory_store(&EngineConfig::default(), Arc::clone(&store));
    (orchestrator, store, quiz_id)
}

/// Receive the next room event; panics if nothing arrives within a couple
/// of (virtual) minutes.
pub async fn next_event(rx: &mut broadcast::Receiver<RoomEvent>) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for a room event")
        .expect("room closed before the expected event")
}

pub async fn create_lobby(orchestrator: &Orchestrator, quiz_id: DbId) -> GameSession {
    match orchestrator
        .dispatch(ClientAction::CreateLobby { quiz_id })
        .await
        .unwrap()
    {
        ActionOutcome::Session(session) => session,
        other => panic!("expected a session, got {other:?}"),
    }
}

pub async fn join_game(orchestrator: &Orchestrator, pin: &str, nickname: &str) -> Player {
    match orchestrator
        .dispatch(ClientAction::JoinGame {
            pin: pin.to_string(),
            nickname: nickname.to_string(),
            user_id: None,
        })
        .await
        .unwrap()
    {
        ActionOutcome::Player(player) => player,
        other => panic!("expected a player, got {other:?}"),
    }
}

pub async fn create_tournament(
    orchestrator: &Orchestrator,
    quiz_id: DbId,
    max_participants: u32,
) -> Tournament {
    match orchestrator
        .dispatch(ClientAction::CreateTournament {
            input: CreateTournament {
                name: "Friday cup".into(),
                bracket_type: BracketType::SingleElimination,
                max_participants,
                quiz_id,
                settings: TournamentSettings::default(),
            },
        })
        .await
        .unwrap()
    {
        ActionOutcome::Tournament(tournament) => tournament,
        other => panic!("expected a tournament, got {other:?}"),
    }
}

pub async fn join_tournament(
    orchestrator: &Orchestrator,
    tournament_id: DbId,
    user_id: DbId,
) -> TournamentParticipant {
    match orchestrator
        .dispatch(ClientAction::JoinTournament {
            tournament_id,
            user_id,
        })
        .await
        .unwrap()
    {
        ActionOutcome::Participant(participant) => participant,
        other => panic!("expected a participant, got {other:?}"),
    }
}
