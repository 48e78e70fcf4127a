//! End-to-end game session scenarios.
//!
//! These run under a paused Tokio clock: the question, reveal, and
//! leaderboard timers fire instantly once the test is otherwise idle, so a
//! full three-question game plays out in milliseconds of real time.

mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use common::*;

use quizlive_core::error::CoreError;
use quizlive_core::session::SessionStatus;
use quizlive_engine::ClientAction;
use quizlive_events::{RoomEvent, RoomId};
use quizlive_store::SessionRepo;

// ---------------------------------------------------------------------------
// Scenario: a full three-question game
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_game_plays_three_questions_to_the_final_leaderboard() {
    let (orchestrator, store, quiz_id) = harness(3).await;

    let session = create_lobby(&orchestrator, quiz_id).await;
    let mut rx = orchestrator
        .subscribe(RoomId::Game(session.pin.clone()))
        .await;

    let alice = join_game(&orchestrator, &session.pin, "alice").await;
    let bob = join_game(&orchestrator, &session.pin, "bob").await;
    assert_matches!(next_event(&mut rx).await, RoomEvent::PlayerList { players } if players.len() == 1);
    assert_matches!(next_event(&mut rx).await, RoomEvent::PlayerList { players } if players.len() == 2);

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();
    assert_matches!(next_event(&mut rx).await, RoomEvent::GameStarted);

    let mut seen_question_numbers = Vec::new();
    for round in 1..=3u32 {
        let (question, number, total) = match next_event(&mut rx).await {
            RoomEvent::NewQuestion {
                question,
                question_number,
                total_questions,
            } => (question, question_number, total_questions),
            other => panic!("expected a question, got {other:?}"),
        };
        assert_eq!(number, round);
        assert_eq!(total, 3);
        seen_question_numbers.push(number);

        // Alice answers right, Bob answers wrong, while the question is open.
        orchestrator
            .dispatch(ClientAction::SubmitGameAnswer {
                pin: session.pin.clone(),
                player_id: alice.id,
                question_id: question.id,
                answer: format!("right-{round}"),
            })
            .await
            .unwrap();
        orchestrator
            .dispatch(ClientAction::SubmitGameAnswer {
                pin: session.pin.clone(),
                player_id: bob.id,
                question_id: question.id,
                answer: format!("wrong-{round}"),
            })
            .await
            .unwrap();

        assert_matches!(
            next_event(&mut rx).await,
            RoomEvent::QuestionTimeout { correct_answer, question_id }
                if correct_answer == format!("right-{round}") && question_id == question.id
        );
        assert_matches!(next_event(&mut rx).await, RoomEvent::ShowLeaderboard { .. });
    }

    // After the third cycle the quiz is exhausted.
    let players = match next_event(&mut rx).await {
        RoomEvent::GameFinished { players } => players,
        other => panic!("expected the final leaderboard, got {other:?}"),
    };
    assert_eq!(players[0].nickname, "alice");
    assert_eq!(players[0].score, 30);
    assert_eq!(players[1].nickname, "bob");
    assert_eq!(players[1].score, 0);

    // Exactly one chain drove the game: no duplicate question broadcasts.
    assert_eq!(seen_question_numbers, vec![1, 2, 3]);

    let stored = SessionRepo::get(store.as_ref(), session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Finished);
    assert_eq!(stored.current_question_index, 2);
}

// ---------------------------------------------------------------------------
// Pin allocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_sessions_never_share_a_pin() {
    let (orchestrator, _store, quiz_id) = harness(1).await;

    let mut pins = HashSet::new();
    for _ in 0..30 {
        let session = create_lobby(&orchestrator, quiz_id).await;
        assert!(pins.insert(session.pin.clone()), "pin {} reused", session.pin);
    }
}

#[tokio::test]
async fn lobby_for_an_empty_quiz_is_rejected() {
    let (orchestrator, store, _quiz_id) = harness(1).await;
    let empty_quiz = store.insert_quiz(Vec::new()).await;

    let err = orchestrator
        .dispatch(ClientAction::CreateLobby { quiz_id: empty_quiz })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

// ---------------------------------------------------------------------------
// Joining
// ---------------------------------------------------------------------------

#[tokio::test]
async fn joining_an_unknown_pin_is_not_found() {
    let (orchestrator, _store, _quiz_id) = harness(1).await;

    let err = orchestrator
        .dispatch(ClientAction::JoinGame {
            pin: "000000".into(),
            nickname: "alice".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[tokio::test]
async fn duplicate_nickname_is_a_conflict() {
    let (orchestrator, _store, quiz_id) = harness(1).await;
    let session = create_lobby(&orchestrator, quiz_id).await;

    join_game(&orchestrator, &session.pin, "alice").await;
    let err = orchestrator
        .dispatch(ClientAction::JoinGame {
            pin: session.pin.clone(),
            nickname: "alice".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn blank_nickname_is_rejected() {
    let (orchestrator, _store, quiz_id) = harness(1).await;
    let session = create_lobby(&orchestrator, quiz_id).await;

    let err = orchestrator
        .dispatch(ClientAction::JoinGame {
            pin: session.pin.clone(),
            nickname: "   ".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test(start_paused = true)]
async fn joining_after_start_is_not_found() {
    let (orchestrator, _store, quiz_id) = harness(1).await;
    let session = create_lobby(&orchestrator, quiz_id).await;
    join_game(&orchestrator, &session.pin, "alice").await;

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();

    // The session is no longer in the lobby, so the pin is not joinable.
    let err = orchestrator
        .dispatch(ClientAction::JoinGame {
            pin: session.pin.clone(),
            nickname: "bob".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[tokio::test(start_paused = true)]
async fn starting_twice_is_a_state_error() {
    let (orchestrator, _store, quiz_id) = harness(1).await;
    let session = create_lobby(&orchestrator, quiz_id).await;
    join_game(&orchestrator, &session.pin, "alice").await;

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();
    let err = orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::State(_));
}

// ---------------------------------------------------------------------------
// Answer window
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn answers_after_the_reveal_are_rejected() {
    let (orchestrator, _store, quiz_id) = harness(2).await;
    let session = create_lobby(&orchestrator, quiz_id).await;
    let mut rx = orchestrator
        .subscribe(RoomId::Game(session.pin.clone()))
        .await;
    let alice = join_game(&orchestrator, &session.pin, "alice").await;

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();

    // Skip to the first question, then let its timer run out.
    let question = loop {
        if let RoomEvent::NewQuestion { question, .. } = next_event(&mut rx).await {
            break question;
        }
    };
    let engine = orchestrator.session_engine();
    assert!(engine.question_open(&session.pin, question.id).await);

    loop {
        if let RoomEvent::QuestionTimeout { .. } = next_event(&mut rx).await {
            break;
        }
    }
    assert!(!engine.question_open(&session.pin, question.id).await);

    let err = orchestrator
        .dispatch(ClientAction::SubmitGameAnswer {
            pin: session.pin.clone(),
            player_id: alice.id,
            question_id: question.id,
            answer: "right-1".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::State(_));
}

#[tokio::test(start_paused = true)]
async fn answering_the_same_question_twice_is_a_conflict() {
    let (orchestrator, _store, quiz_id) = harness(2).await;
    let session = create_lobby(&orchestrator, quiz_id).await;
    let mut rx = orchestrator
        .subscribe(RoomId::Game(session.pin.clone()))
        .await;
    let alice = join_game(&orchestrator, &session.pin, "alice").await;

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();
    let question = loop {
        if let RoomEvent::NewQuestion { question, .. } = next_event(&mut rx).await {
            break question;
        }
    };

    let submit = ClientAction::SubmitGameAnswer {
        pin: session.pin.clone(),
        player_id: alice.id,
        question_id: question.id,
        answer: "right-1".into(),
    };
    orchestrator.dispatch(submit.clone()).await.unwrap();
    let err = orchestrator.dispatch(submit).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

// ---------------------------------------------------------------------------
// Timer chains
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn finished_sessions_leave_no_outstanding_chain() {
    let (orchestrator, store, quiz_id) = harness(1).await;
    let session = create_lobby(&orchestrator, quiz_id).await;
    let mut rx = orchestrator
        .subscribe(RoomId::Game(session.pin.clone()))
        .await;
    join_game(&orchestrator, &session.pin, "alice").await;

    orchestrator
        .dispatch(ClientAction::StartGame {
            pin: session.pin.clone(),
        })
        .await
        .unwrap();

    loop {
        if let RoomEvent::GameFinished { .. } = next_event(&mut rx).await {
            break;
        }
    }
    // Give the chain task its final poll.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(orchestrator.timers().active_chains().await, 0);
    let stored = SessionRepo::get(store.as_ref(), session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Finished);
}
