//! Game session engine: lobby, question loop, final leaderboard.
//!
//! Each active session is driven by a single timer chain that broadcasts
//! the next question, the reveal, and the leaderboard on the fixed protocol
//! cadence. The chain is the only writer of the session's question index,
//! so events leave the room strictly in production order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use quizlive_core::error::CoreError;
use quizlive_core::scoring::{self, AnswerReceipt};
use quizlive_core::session::{
    generate_pin, rank_players, GameSession, Player, PlayerAnswer, SessionStatus,
    LEADERBOARD_SECONDS, QUESTION_SECONDS, REVEAL_SECONDS,
};
use quizlive_core::types::{DbId, Timestamp};
use quizlive_events::{PlayerView, QuestionView, RoomBroadcaster, RoomEvent, RoomId};
use quizlive_store::{QuizRepo, SessionRepo};

use crate::lock::AggregateLocks;
use crate::timer::{sleep_or_cancelled, TimerService};

/// Pin allocation is serialized globally so two lobbies can never draw the
/// same pin between the uniqueness check and the insert.
const PIN_ALLOCATION_KEY: &str = "session:pin-allocation";

fn session_key(pin: &str) -> String {
    format!("session:{pin}")
}

/// The question currently accepting answers for a session.
#[derive(Debug, Clone)]
struct OpenQuestion {
    question_id: DbId,
    opened_at: Timestamp,
}

/// What one step of the question loop did.
enum Step {
    Question,
    Finished,
}

/// Drives the lobby → question loop → leaderboard flow for every live pin.
pub struct GameSessionEngine {
    sessions: Arc<dyn SessionRepo>,
    quizzes: Arc<dyn QuizRepo>,
    rooms: Arc<RoomBroadcaster>,
    timers: Arc<TimerService>,
    locks: Arc<AggregateLocks>,
    open_questions: RwLock<HashMap<String, OpenQuestion>>,
    pin_attempts: u32,
}

impl GameSessionEngine {
    pub fn new(
        sessions: Arc<dyn SessionRepo>,
        quizzes: Arc<dyn QuizRepo>,
        rooms: Arc<RoomBroadcaster>,
        timers: Arc<TimerService>,
        locks: Arc<AggregateLocks>,
        pin_attempts: u32,
    ) -> Self {
        Self {
            sessions,
            quizzes,
            rooms,
            timers,
            locks,
            open_questions: RwLock::new(HashMap::new()),
            pin_attempts,
        }
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Create a lobby with a pin unique among live sessions.
    pub async fn create_lobby(&self, quiz_id: DbId) -> Result<GameSession, CoreError> {
        let questions = self.quizzes.questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(CoreError::Validation(format!("quiz {quiz_id} has no questions")));
        }

        let _guard = self.locks.acquire(PIN_ALLOCATION_KEY).await;
        for _ in 0..self.pin_attempts {
            let pin = {
                let mut rng = rand::rng();
                generate_pin(&mut rng)
            };
            if self.sessions.pin_in_use(&pin).await? {
                continue;
            }
            let session = self
                .sessions
                .create(GameSession::new_lobby(quiz_id, pin))
                .await?;
            tracing::info!(session_id = session.id, pin = %session.pin, "Lobby created");
            return Ok(session);
        }
        Err(CoreError::Internal(format!(
            "no free pin after {} attempts",
            self.pin_attempts
        )))
    }

    /// Join a lobby under a nickname unique within the session.
    pub async fn join(
        &self,
        pin: &str,
        nickname: &str,
        user_id: Option<DbId>,
    ) -> Result<Player, CoreError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(CoreError::Validation("nickname must not be empty".into()));
        }

        let _guard = self.locks.acquire(&session_key(pin)).await;
        let mut session = self
            .sessions
            .find_active_by_pin(pin)
            .await?
            .filter(|s| s.status == SessionStatus::Lobby)
            .ok_or_else(|| CoreError::not_found_key("game session", pin))?;
        if session.has_nickname(nickname) {
            return Err(CoreError::Conflict(format!(
                "nickname '{nickname}' is already taken"
            )));
        }

        let player = Player {
            id: self.sessions.allocate_id().await?,
            nickname: nickname.to_string(),
            score: 0,
            user_id,
            answers: Vec::new(),
        };
        session.players.push(player.clone());
        self.sessions.save(session.clone()).await?;

        self.rooms
            .publish(
                &RoomId::Game(pin.to_string()),
                RoomEvent::PlayerList {
                    players: session.players.iter().map(PlayerView::from).collect(),
                },
            )
            .await;
        tracing::debug!(pin, player_id = player.id, nickname = %player.nickname, "Player joined");
        Ok(player)
    }

    // -----------------------------------------------------------------------
    // Question loop
    // -----------------------------------------------------------------------

    /// Start the game: transition to active and kick off the question chain.
    pub async fn start(self: Arc<Self>, pin: &str) -> Result<(), CoreError> {
        {
            let _guard = self.locks.acquire(&session_key(pin)).await;
            let mut session = self
                .sessions
                .find_active_by_pin(pin)
                .await?
                .ok_or_else(|| CoreError::not_found_key("game session", pin))?;
            if !session.status.can_transition(SessionStatus::Active) {
                return Err(CoreError::State(format!(
                    "cannot start a session in status {:?}",
                    session.status
                )));
            }
            session.status = SessionStatus::Active;
            self.sessions.save(session).await?;
        }

        self.rooms
            .publish(&RoomId::Game(pin.to_string()), RoomEvent::GameStarted)
            .await;
        tracing::info!(pin, "Game started");

        let token = self.timers.arm(&session_key(pin)).await;
        let engine = Arc::clone(&self);
        tokio::spawn(engine.question_loop(pin.to_string(), token));
        Ok(())
    }

    /// The timer chain: question, reveal, leaderboard, next question.
    /// Cancellation is checked at every suspension point; a cancelled chain
    /// stops without touching its session again.
    async fn question_loop(self: Arc<Self>, pin: String, token: CancellationToken) {
        loop {
            match self.advance(&pin).await {
                Ok(Step::Question) => {}
                Ok(Step::Finished) => break,
                Err(e) => {
                    self.halt_chain(&pin, &e).await;
                    break;
                }
            }
            if !sleep_or_cancelled(&token, QUESTION_SECONDS).await {
                return;
            }
            if let Err(e) = self.reveal(&pin).await {
                self.halt_chain(&pin, &e).await;
                break;
            }
            if !sleep_or_cancelled(&token, REVEAL_SECONDS).await {
                return;
            }
            if let Err(e) = self.leaderboard(&pin).await {
                self.halt_chain(&pin, &e).await;
                break;
            }
            if !sleep_or_cancelled(&token, LEADERBOARD_SECONDS).await {
                return;
            }
        }
        self.timers.complete(&session_key(&pin)).await;
    }

    /// Send the next question, or finish the session when the quiz is
    /// exhausted. The index advances by exactly 1 per cycle.
    async fn advance(&self, pin: &str) -> Result<Step, CoreError> {
        let _guard = self.locks.acquire(&session_key(pin)).await;
        let mut session = self.require_active(pin).await?;
        let questions = self.quizzes.questions(session.quiz_id).await?;
        let room = RoomId::Game(pin.to_string());

        let next_index = session.current_question_index + 1;
        if next_index as usize >= questions.len() {
            session.status = SessionStatus::Finished;
            self.sessions.save(session.clone()).await?;
            self.open_questions.write().await.remove(pin);

            let players = rank_players(&session.players)
                .iter()
                .map(PlayerView::from)
                .collect();
            self.rooms
                .publish(&room, RoomEvent::GameFinished { players })
                .await;
            self.rooms.close(&room).await;
            self.locks.discard(&session_key(pin)).await;
            tracing::info!(pin, session_id = session.id, "Game finished");
            return Ok(Step::Finished);
        }

        let question = &questions[next_index as usize];
        session.current_question_index = next_index;
        self.sessions.save(session).await?;
        self.open_questions.write().await.insert(
            pin.to_string(),
            OpenQuestion {
                question_id: question.id,
                opened_at: Utc::now(),
            },
        );
        self.rooms
            .publish(
                &room,
                RoomEvent::NewQuestion {
                    question: QuestionView::from(question),
                    question_number: (next_index + 1) as u32,
                    total_questions: questions.len() as u32,
                },
            )
            .await;
        tracing::debug!(pin, question_id = question.id, number = next_index + 1, "Question sent");
        Ok(Step::Question)
    }

    /// Close the current question and reveal its correct answer.
    async fn reveal(&self, pin: &str) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(&session_key(pin)).await;
        let session = self.require_active(pin).await?;
        let questions = self.quizzes.questions(session.quiz_id).await?;
        let question = usize::try_from(session.current_question_index)
            .ok()
            .and_then(|i| questions.get(i))
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "no question at index {}",
                    session.current_question_index
                ))
            })?;
        let correct_answer = question
            .correct_answer_text()
            .ok_or_else(|| CoreError::Internal(format!("question {} has no correct option", question.id)))?
            .to_string();

        self.open_questions.write().await.remove(pin);
        self.rooms
            .publish(
                &RoomId::Game(pin.to_string()),
                RoomEvent::QuestionTimeout {
                    correct_answer,
                    question_id: question.id,
                },
            )
            .await;
        Ok(())
    }

    /// Broadcast the standings between questions.
    async fn leaderboard(&self, pin: &str) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(&session_key(pin)).await;
        let session = self.require_active(pin).await?;
        let players = rank_players(&session.players)
            .iter()
            .map(PlayerView::from)
            .collect();
        self.rooms
            .publish(
                &RoomId::Game(pin.to_string()),
                RoomEvent::ShowLeaderboard { players },
            )
            .await;
        Ok(())
    }

    /// A chain that finds inconsistent state logs, tells the room, and
    /// halts. Other sessions are unaffected.
    async fn halt_chain(&self, pin: &str, error: &CoreError) {
        tracing::error!(pin, error = %error, "Question chain halted");
        self.open_questions.write().await.remove(pin);
        self.rooms
            .publish(
                &RoomId::Game(pin.to_string()),
                RoomEvent::GameError {
                    message: error.to_string(),
                },
            )
            .await;
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    /// Whether the given question is still accepting answers. The engine is
    /// the single authority on this; the reveal step closes the question.
    pub async fn question_open(&self, pin: &str, question_id: DbId) -> bool {
        self.open_questions
            .read()
            .await
            .get(pin)
            .is_some_and(|open| open.question_id == question_id)
    }

    /// Record an answer for the currently open question. Late answers are
    /// rejected; a player answers each question at most once.
    pub async fn submit_answer(
        &self,
        pin: &str,
        player_id: DbId,
        question_id: DbId,
        answer: &str,
    ) -> Result<AnswerReceipt, CoreError> {
        let _guard = self.locks.acquire(&session_key(pin)).await;
        let mut session = self.require_active(pin).await?;

        let open = self
            .open_questions
            .read()
            .await
            .get(pin)
            .cloned()
            .filter(|open| open.question_id == question_id)
            .ok_or_else(|| {
                CoreError::State(format!("question {question_id} is no longer open"))
            })?;

        let questions = self.quizzes.questions(session.quiz_id).await?;
        let correct_answer = questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| CoreError::not_found("question", question_id))?
            .correct_answer_text()
            .ok_or_else(|| CoreError::Internal(format!("question {question_id} has no correct option")))?
            .to_string();

        let response_time_ms = (Utc::now() - open.opened_at).num_milliseconds().max(0) as u64;
        let player = session
            .player_mut(player_id)
            .ok_or_else(|| CoreError::not_found("player", player_id))?;
        if player.answers.iter().any(|a| a.question_id == question_id) {
            return Err(CoreError::Conflict(format!(
                "player {player_id} already answered question {question_id}"
            )));
        }

        let is_correct = scoring::is_correct(answer, &correct_answer);
        let points_awarded = scoring::points_for(is_correct);
        player.answers.push(PlayerAnswer {
            question_id,
            answer: answer.to_string(),
            is_correct,
            response_time_ms,
        });
        player.score += points_awarded;
        let new_score = player.score;
        self.sessions.save(session).await?;

        Ok(AnswerReceipt {
            is_correct,
            points_awarded,
            new_score,
        })
    }

    // -----------------------------------------------------------------------
    // Shared
    // -----------------------------------------------------------------------

    async fn require_active(&self, pin: &str) -> Result<GameSession, CoreError> {
        let session = self
            .sessions
            .find_active_by_pin(pin)
            .await?
            .ok_or_else(|| CoreError::not_found_key("game session", pin))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::State(format!(
                "session {pin} is not active (status {:?})",
                session.status
            )));
        }
        Ok(session)
    }
}
