//! Battle engine: head-to-head contests with live scoring.
//!
//! Battles are client-paced (no timer chain): both contestants work through
//! the same question snapshot and every submission broadcasts the updated
//! scores to the battle room.

use std::sync::Arc;

use chrono::Utc;

use quizlive_core::battle::{
    decide_winner, remaining_seconds, select_questions, Battle, BattleOutcome, BattleParticipant,
    BattleQuestion, BattleResults, BattleSettings, BattleStatus, BattleType, ParticipantStats,
    DEFAULT_QUESTION_COUNT, DEFAULT_TIME_LIMIT_SECONDS,
};
use quizlive_core::error::CoreError;
use quizlive_core::quiz::QuizQuestion;
use quizlive_core::scoring::{self, AnswerReceipt};
use quizlive_core::types::{DbId, Timestamp};
use quizlive_events::{BracketBattleView, RoomBroadcaster, RoomEvent, RoomId};
use quizlive_store::{BattleRepo, QuizRepo, TournamentRepo};

use crate::lock::AggregateLocks;
use crate::timer::TimerService;

fn battle_key(id: DbId) -> String {
    format!("battle:{id}")
}

fn tournament_key(id: DbId) -> String {
    format!("tournament:{id}")
}

/// Point-in-time battle snapshot served by [`BattleEngine::stats`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStats {
    pub total_questions: u32,
    pub completed_questions: u32,
    pub player1_score: i32,
    pub player2_score: i32,
    pub winner_id: Option<DbId>,
    /// Remaining seconds for the in-flight question; `None` unless active.
    pub time_remaining: Option<u32>,
}

/// Drives the scheduled → active → finished lifecycle of every battle.
pub struct BattleEngine {
    battles: Arc<dyn BattleRepo>,
    tournaments: Arc<dyn TournamentRepo>,
    quizzes: Arc<dyn QuizRepo>,
    rooms: Arc<RoomBroadcaster>,
    timers: Arc<TimerService>,
    locks: Arc<AggregateLocks>,
}

impl BattleEngine {
    pub fn new(
        battles: Arc<dyn BattleRepo>,
        tournaments: Arc<dyn TournamentRepo>,
        quizzes: Arc<dyn QuizRepo>,
        rooms: Arc<RoomBroadcaster>,
        timers: Arc<TimerService>,
        locks: Arc<AggregateLocks>,
    ) -> Self {
        Self {
            battles,
            tournaments,
            quizzes,
            rooms,
            timers,
            locks,
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a tournament battle between two users, snapshotting its
    /// questions from the tournament's quiz.
    pub async fn create(
        &self,
        tournament_id: DbId,
        player1: DbId,
        player2: DbId,
        round: u32,
    ) -> Result<Battle, CoreError> {
        if player1 == player2 {
            return Err(CoreError::Validation(
                "a battle needs two distinct players".into(),
            ));
        }

        let tournament = self.tournaments.get(tournament_id).await?;
        let source = self.quizzes.questions(tournament.quiz_id).await?;
        if source.is_empty() {
            return Err(CoreError::not_found("quiz questions", tournament.quiz_id));
        }

        let time_limit = tournament
            .settings
            .time_limit_seconds
            .unwrap_or(DEFAULT_TIME_LIMIT_SECONDS);
        let picked: Vec<QuizQuestion> = {
            let mut rng = rand::rng();
            select_questions(&mut rng, &source, DEFAULT_QUESTION_COUNT)
                .into_iter()
                .cloned()
                .collect()
        };

        let questions = picked
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let correct_answer = q
                    .correct_answer_text()
                    .ok_or_else(|| {
                        CoreError::Internal(format!("question {} has no correct option", q.id))
                    })?
                    .to_string();
                Ok(BattleQuestion {
                    id: 0,
                    battle_id: 0,
                    question_text: q.text.clone(),
                    options: q.options.clone(),
                    correct_answer,
                    order: i as u32 + 1,
                    time_limit,
                    asked_at: None,
                    answered_at: None,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let battle = Battle {
            id: 0,
            name: format!("Round {round}: {player1} vs {player2}"),
            status: BattleStatus::Scheduled,
            battle_type: BattleType::Tournament,
            quiz_id: tournament.quiz_id,
            tournament_id: Some(tournament_id),
            round: Some(round),
            settings: BattleSettings {
                time_limit_seconds: time_limit,
                questions_count: questions.len() as u32,
                allow_spectators: tournament.settings.allow_spectators,
                auto_start: tournament.settings.auto_start,
            },
            participants: vec![BattleParticipant::new(player1), BattleParticipant::new(player2)],
            questions,
            results: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        let battle = self.battles.create(battle).await?;

        self.rooms
            .publish(
                &RoomId::Tournament(tournament_id),
                RoomEvent::BracketUpdate {
                    battles: vec![bracket_view(&battle)],
                },
            )
            .await;
        tracing::info!(
            battle_id = battle.id,
            tournament_id,
            round,
            questions = battle.questions.len(),
            "Battle created",
        );
        Ok(battle)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start a scheduled or waiting battle.
    pub async fn start(&self, id: DbId) -> Result<Battle, CoreError> {
        let _guard = self.locks.acquire(&battle_key(id)).await;
        let mut battle = self.battles.get(id).await?;
        if !battle.status.can_start() {
            return Err(CoreError::State(format!(
                "cannot start a battle in status {:?}",
                battle.status
            )));
        }

        let now = Utc::now();
        battle.status = BattleStatus::Active;
        battle.started_at = Some(now);
        if let Some(first) = battle.question_by_order_mut(1) {
            first.asked_at = Some(now);
        }
        self.battles.save(battle.clone()).await?;

        let room = RoomId::Battle(id);
        self.rooms
            .publish(&room, RoomEvent::BattleStarted { battle_id: id })
            .await;
        self.rooms.publish(&room, status_frame(&battle)).await;
        tracing::info!(battle_id = id, "Battle started");
        Ok(battle)
    }

    /// Record an answer for one participant and broadcast the new scores.
    /// Resubmitting the same question is a conflict, so counters increment
    /// at most once per question per participant.
    pub async fn submit_answer(
        &self,
        id: DbId,
        user_id: DbId,
        question_order: u32,
        answer: &str,
    ) -> Result<AnswerReceipt, CoreError> {
        let _guard = self.locks.acquire(&battle_key(id)).await;
        let mut battle = self.battles.get(id).await?;
        if battle.status != BattleStatus::Active {
            return Err(CoreError::State(format!(
                "cannot answer in a battle in status {:?}",
                battle.status
            )));
        }
        let started_at = battle
            .started_at
            .ok_or_else(|| CoreError::Internal(format!("active battle {id} has no start time")))?;

        let question = battle
            .question_by_order(question_order)
            .cloned()
            .ok_or_else(|| CoreError::not_found("battle question", i64::from(question_order)))?;

        let now = Utc::now();
        let asked_at = question
            .asked_at
            .or_else(|| previous_answered_at(&battle, question_order))
            .unwrap_or(started_at);
        let response_time_ms = (now - asked_at).num_milliseconds().max(0) as u64;

        let is_correct = scoring::is_correct(answer, &question.correct_answer);
        let points_awarded = scoring::points_for(is_correct);

        let participant = battle
            .participant_by_user_mut(user_id)
            .ok_or_else(|| CoreError::not_found("battle participant", user_id))?;
        if participant.has_answered(question.id) {
            return Err(CoreError::Conflict(format!(
                "user {user_id} already answered question {question_order}"
            )));
        }
        participant.answers.push(quizlive_core::battle::BattleAnswer {
            question_id: question.id,
            answer: answer.to_string(),
            is_correct,
            response_time_ms,
        });
        participant.average_response_time_ms = scoring::update_average(
            participant.average_response_time_ms,
            participant.questions_answered,
            response_time_ms,
        );
        participant.questions_answered += 1;
        if is_correct {
            participant.correct_answers += 1;
        }
        participant.score += points_awarded;
        let new_score = participant.score;

        if let Some(stamped) = battle.question_by_order_mut(question_order) {
            if stamped.asked_at.is_none() {
                stamped.asked_at = Some(asked_at);
            }
            stamped.answered_at = Some(now);
        }
        self.battles.save(battle.clone()).await?;

        let room = RoomId::Battle(id);
        self.rooms
            .publish(
                &room,
                RoomEvent::ScoreUpdate {
                    player1_score: battle.participants[0].score,
                    player2_score: battle.participants[1].score,
                },
            )
            .await;
        let current = battle.current_question_order();
        self.rooms
            .publish(
                &room,
                RoomEvent::QuestionUpdate {
                    question_number: current,
                    time_remaining: remaining_seconds(
                        battle.settings.time_limit_seconds,
                        started_at,
                        now,
                        current,
                    ),
                },
            )
            .await;

        Ok(AnswerReceipt {
            is_correct,
            points_awarded,
            new_score,
        })
    }

    /// Finish an active battle: decide the winner, write the results, and
    /// feed the outcome back into the tournament standings.
    pub async fn end(&self, id: DbId) -> Result<Battle, CoreError> {
        let (battle, outcome) = {
            let _guard = self.locks.acquire(&battle_key(id)).await;
            let mut battle = self.battles.get(id).await?;
            if battle.status != BattleStatus::Active {
                return Err(CoreError::State(format!(
                    "cannot end a battle in status {:?}",
                    battle.status
                )));
            }
            if battle.participants.len() != 2 {
                return Err(CoreError::State(format!(
                    "battle {id} has {} participants, expected 2",
                    battle.participants.len()
                )));
            }

            let outcome = decide_winner(&battle.participants[0], &battle.participants[1]);
            let (winner_id, loser_id, is_draw) = match outcome {
                BattleOutcome::Winner {
                    winner_user_id,
                    loser_user_id,
                } => (Some(winner_user_id), Some(loser_user_id), false),
                BattleOutcome::Draw => (None, None, true),
            };
            battle.results = Some(BattleResults {
                winner_id,
                loser_id,
                is_draw,
                player1_score: battle.participants[0].score,
                player2_score: battle.participants[1].score,
                stats: battle.participants.iter().map(participant_stats).collect(),
            });
            battle.status = BattleStatus::Finished;
            battle.finished_at = Some(Utc::now());
            self.battles.save(battle.clone()).await?;
            (battle, outcome)
        };

        if let Some(tournament_id) = battle.tournament_id {
            self.record_tournament_result(tournament_id, &battle, &outcome)
                .await?;
        }

        let room = RoomId::Battle(id);
        self.rooms
            .publish(
                &room,
                RoomEvent::BattleEnded {
                    winner_id: battle.results.as_ref().and_then(|r| r.winner_id),
                },
            )
            .await;
        self.rooms.close(&room).await;
        self.timers.cancel(&battle_key(id)).await;
        self.locks.discard(&battle_key(id)).await;
        tracing::info!(
            battle_id = id,
            winner_id = battle.results.as_ref().and_then(|r| r.winner_id),
            "Battle ended",
        );
        Ok(battle)
    }

    /// Cancel a battle from any non-terminal state. Reserved for admin and
    /// cleanup flows.
    pub async fn cancel(&self, id: DbId) -> Result<Battle, CoreError> {
        let _guard = self.locks.acquire(&battle_key(id)).await;
        let mut battle = self.battles.get(id).await?;
        if !battle.status.can_transition(BattleStatus::Cancelled) {
            return Err(CoreError::State(format!(
                "cannot cancel a battle in status {:?}",
                battle.status
            )));
        }
        battle.status = BattleStatus::Cancelled;
        self.battles.save(battle.clone()).await?;

        let room = RoomId::Battle(id);
        self.rooms.publish(&room, status_frame(&battle)).await;
        self.rooms.close(&room).await;
        self.timers.cancel(&battle_key(id)).await;
        self.locks.discard(&battle_key(id)).await;
        tracing::info!(battle_id = id, "Battle cancelled");
        Ok(battle)
    }

    // -----------------------------------------------------------------------
    // Reads and relays
    // -----------------------------------------------------------------------

    /// Point-in-time battle statistics. Pure read.
    pub async fn stats(&self, id: DbId) -> Result<BattleStats, CoreError> {
        let battle = self.battles.get(id).await?;
        let time_remaining = match (battle.status, battle.started_at) {
            (BattleStatus::Active, Some(started_at)) => Some(remaining_seconds(
                battle.settings.time_limit_seconds,
                started_at,
                Utc::now(),
                battle.current_question_order(),
            )),
            _ => None,
        };
        Ok(BattleStats {
            total_questions: battle.questions.len() as u32,
            completed_questions: battle
                .questions
                .iter()
                .filter(|q| q.answered_at.is_some())
                .count() as u32,
            player1_score: battle.participants.first().map_or(0, |p| p.score),
            player2_score: battle.participants.get(1).map_or(0, |p| p.score),
            winner_id: battle.results.as_ref().and_then(|r| r.winner_id),
            time_remaining,
        })
    }

    /// Relay a chat message to the battle room.
    pub async fn chat(&self, id: DbId, user_id: DbId, message: &str) -> Result<(), CoreError> {
        let _battle = self.battles.get(id).await?;
        self.rooms
            .publish(
                &RoomId::Battle(id),
                RoomEvent::ChatMessage {
                    user_id,
                    message: message.to_string(),
                },
            )
            .await;
        Ok(())
    }

    /// Relay a free-form battle action to the battle room.
    pub async fn action(
        &self,
        id: DbId,
        user_id: DbId,
        action: serde_json::Value,
    ) -> Result<(), CoreError> {
        let _battle = self.battles.get(id).await?;
        self.rooms
            .publish(&RoomId::Battle(id), RoomEvent::BattleAction { user_id, action })
            .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tournament standings
    // -----------------------------------------------------------------------

    /// Update wins/losses (or draws for a tie) on the tournament
    /// participants of a finished battle. In single elimination the loser is
    /// eliminated.
    async fn record_tournament_result(
        &self,
        tournament_id: DbId,
        battle: &Battle,
        outcome: &BattleOutcome,
    ) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(&tournament_key(tournament_id)).await;
        let mut tournament = self.tournaments.get(tournament_id).await?;
        match *outcome {
            BattleOutcome::Winner {
                winner_user_id,
                loser_user_id,
            } => {
                if let Some(winner) = tournament.participant_by_user_mut(winner_user_id) {
                    winner.wins += 1;
                }
                if let Some(loser) = tournament.participant_by_user_mut(loser_user_id) {
                    loser.losses += 1;
                    loser.is_eliminated = true;
                }
            }
            BattleOutcome::Draw => {
                for participant in &battle.participants {
                    if let Some(p) = tournament.participant_by_user_mut(participant.user_id) {
                        p.draws += 1;
                    }
                }
            }
        }
        self.tournaments.save(tournament).await
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn bracket_view(battle: &Battle) -> BracketBattleView {
    BracketBattleView {
        battle_id: battle.id,
        round: battle.round.unwrap_or(1),
        player1_id: battle.participants.first().map_or(0, |p| p.user_id),
        player2_id: battle.participants.get(1).map_or(0, |p| p.user_id),
        status: battle.status,
    }
}

fn status_frame(battle: &Battle) -> RoomEvent {
    RoomEvent::BattleUpdate {
        status: battle.status,
        player1_score: battle.participants.first().map_or(0, |p| p.score),
        player2_score: battle.participants.get(1).map_or(0, |p| p.score),
        current_question: (battle.status == BattleStatus::Active)
            .then(|| battle.current_question_order()),
        time_remaining: match (battle.status, battle.started_at) {
            (BattleStatus::Active, Some(started_at)) => Some(remaining_seconds(
                battle.settings.time_limit_seconds,
                started_at,
                Utc::now(),
                battle.current_question_order(),
            )),
            _ => None,
        },
        winner_id: battle.results.as_ref().and_then(|r| r.winner_id),
    }
}

fn participant_stats(participant: &BattleParticipant) -> ParticipantStats {
    ParticipantStats {
        user_id: participant.user_id,
        score: participant.score,
        questions_answered: participant.questions_answered,
        correct_answers: participant.correct_answers,
        average_response_time_ms: participant.average_response_time_ms,
    }
}

/// The previous question's answer time, used to anchor response-time
/// measurement for client-paced battles.
fn previous_answered_at(battle: &Battle, question_order: u32) -> Option<Timestamp> {
    if question_order <= 1 {
        return None;
    }
    battle
        .question_by_order(question_order - 1)
        .and_then(|q| q.answered_at)
}
