//! Orchestration façade: the single entry point for client actions.
//!
//! The transport layer (out of scope here) authenticates the caller and
//! hands a [`ClientAction`] to [`Orchestrator::dispatch`], which routes it
//! to the owning engine. Engines are process-wide singletons and every
//! aggregate mutation runs under that aggregate's keyed lock, so there is
//! exactly one authority per session, battle, and tournament id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use quizlive_core::battle::Battle;
use quizlive_core::error::CoreError;
use quizlive_core::scoring::AnswerReceipt;
use quizlive_core::session::{GameSession, Player};
use quizlive_core::tournament::{Tournament, TournamentParticipant};
use quizlive_core::types::DbId;
use quizlive_events::{RoomBroadcaster, RoomEvent, RoomId};
use quizlive_store::{BattleRepo, MemoryStore, QuizRepo, SessionRepo, TournamentRepo};

use crate::battle::{BattleEngine, BattleStats};
use crate::config::EngineConfig;
use crate::lock::AggregateLocks;
use crate::session::GameSessionEngine;
use crate::timer::TimerService;
use crate::tournament::{CreateTournament, TournamentEngine};

/// An inbound player/client action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    // --- Game sessions ---
    CreateLobby { quiz_id: DbId },
    JoinGame {
        pin: String,
        nickname: String,
        user_id: Option<DbId>,
    },
    StartGame { pin: String },
    SubmitGameAnswer {
        pin: String,
        player_id: DbId,
        question_id: DbId,
        answer: String,
    },

    // --- Battles ---
    StartBattle { battle_id: DbId },
    SubmitBattleAnswer {
        battle_id: DbId,
        user_id: DbId,
        question_order: u32,
        answer: String,
    },
    EndBattle { battle_id: DbId },
    CancelBattle { battle_id: DbId },
    BattleStats { battle_id: DbId },
    BattleChat {
        battle_id: DbId,
        user_id: DbId,
        message: String,
    },
    BattleAction {
        battle_id: DbId,
        user_id: DbId,
        action: serde_json::Value,
    },

    // --- Tournaments ---
    CreateTournament { input: CreateTournament },
    OpenRegistration { tournament_id: DbId },
    JoinTournament { tournament_id: DbId, user_id: DbId },
    StartTournament { tournament_id: DbId },
    GenerateBrackets { tournament_id: DbId },
    FinishTournament {
        tournament_id: DbId,
        winner_user_id: DbId,
    },
    CancelTournament { tournament_id: DbId },
}

/// What a dispatched action produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionOutcome {
    Session(GameSession),
    Player(Player),
    Answer(AnswerReceipt),
    Battle(Box<Battle>),
    Battles(Vec<Battle>),
    Stats(BattleStats),
    Tournament(Tournament),
    Participant(TournamentParticipant),
    Ack,
}

/// The façade owning one instance of each engine and the shared services.
pub struct Orchestrator {
    sessions: Arc<GameSessionEngine>,
    battles: Arc<BattleEngine>,
    tournaments: Arc<TournamentEngine>,
    rooms: Arc<RoomBroadcaster>,
    timers: Arc<TimerService>,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        quiz_repo: Arc<dyn QuizRepo>,
        session_repo: Arc<dyn SessionRepo>,
        battle_repo: Arc<dyn BattleRepo>,
        tournament_repo: Arc<dyn TournamentRepo>,
    ) -> Self {
        let rooms = Arc::new(RoomBroadcaster::new(config.room_capacity));
        let timers = Arc::new(TimerService::new());
        let locks = Arc::new(AggregateLocks::new());

        let sessions = Arc::new(GameSessionEngine::new(
            session_repo,
            Arc::clone(&quiz_repo),
            Arc::clone(&rooms),
            Arc::clone(&timers),
            Arc::clone(&locks),
            config.pin_attempts,
        ));
        let battles = Arc::new(BattleEngine::new(
            battle_repo,
            Arc::clone(&tournament_repo),
            quiz_repo,
            Arc::clone(&rooms),
            Arc::clone(&timers),
            Arc::clone(&locks),
        ));
        let tournaments = Arc::new(TournamentEngine::new(
            tournament_repo,
            Arc::clone(&battles),
            Arc::clone(&rooms),
            locks,
        ));

        Self {
            sessions,
            battles,
            tournaments,
            rooms,
            timers,
        }
    }

    /// Wire every repository to one shared [`MemoryStore`].
    pub fn with_memory_store(config: &EngineConfig, store: Arc<MemoryStore>) -> Self {
        Self::new(
            config,
            Arc::clone(&store) as Arc<dyn QuizRepo>,
            Arc::clone(&store) as Arc<dyn SessionRepo>,
            Arc::clone(&store) as Arc<dyn BattleRepo>,
            store as Arc<dyn TournamentRepo>,
        )
    }

    /// Route an action to the owning engine.
    pub async fn dispatch(&self, action: ClientAction) -> Result<ActionOutcome, CoreError> {
        match action {
            ClientAction::CreateLobby { quiz_id } => self
                .sessions
                .create_lobby(quiz_id)
                .await
                .map(ActionOutcome::Session),
            ClientAction::JoinGame {
                pin,
                nickname,
                user_id,
            } => self
                .sessions
                .join(&pin, &nickname, user_id)
                .await
                .map(ActionOutcome::Player),
            ClientAction::StartGame { pin } => Arc::clone(&self.sessions)
                .start(&pin)
                .await
                .map(|()| ActionOutcome::Ack),
            ClientAction::SubmitGameAnswer {
                pin,
                player_id,
                question_id,
                answer,
            } => self
                .sessions
                .submit_answer(&pin, player_id, question_id, &answer)
                .await
                .map(ActionOutcome::Answer),

            ClientAction::StartBattle { battle_id } => self
                .battles
                .start(battle_id)
                .await
                .map(|b| ActionOutcome::Battle(Box::new(b))),
            ClientAction::SubmitBattleAnswer {
                battle_id,
                user_id,
                question_order,
                answer,
            } => self
                .battles
                .submit_answer(battle_id, user_id, question_order, &answer)
                .await
                .map(ActionOutcome::Answer),
            ClientAction::EndBattle { battle_id } => self
                .battles
                .end(battle_id)
                .await
                .map(|b| ActionOutcome::Battle(Box::new(b))),
            ClientAction::CancelBattle { battle_id } => self
                .battles
                .cancel(battle_id)
                .await
                .map(|b| ActionOutcome::Battle(Box::new(b))),
            ClientAction::BattleStats { battle_id } => {
                self.battles.stats(battle_id).await.map(ActionOutcome::Stats)
            }
            ClientAction::BattleChat {
                battle_id,
                user_id,
                message,
            } => self
                .battles
                .chat(battle_id, user_id, &message)
                .await
                .map(|()| ActionOutcome::Ack),
            ClientAction::BattleAction {
                battle_id,
                user_id,
                action,
            } => self
                .battles
                .action(battle_id, user_id, action)
                .await
                .map(|()| ActionOutcome::Ack),

            ClientAction::CreateTournament { input } => self
                .tournaments
                .create(input)
                .await
                .map(ActionOutcome::Tournament),
            ClientAction::OpenRegistration { tournament_id } => self
                .tournaments
                .open_registration(tournament_id)
                .await
                .map(ActionOutcome::Tournament),
            ClientAction::JoinTournament {
                tournament_id,
                user_id,
            } => self
                .tournaments
                .join(tournament_id, user_id)
                .await
                .map(ActionOutcome::Participant),
            ClientAction::StartTournament { tournament_id } => self
                .tournaments
                .start(tournament_id)
                .await
                .map(ActionOutcome::Tournament),
            ClientAction::GenerateBrackets { tournament_id } => self
                .tournaments
                .generate_brackets(tournament_id)
                .await
                .map(ActionOutcome::Battles),
            ClientAction::FinishTournament {
                tournament_id,
                winner_user_id,
            } => self
                .tournaments
                .finish(tournament_id, winner_user_id)
                .await
                .map(ActionOutcome::Tournament),
            ClientAction::CancelTournament { tournament_id } => self
                .tournaments
                .cancel(tournament_id)
                .await
                .map(ActionOutcome::Tournament),
        }
    }

    /// Subscribe to a room's event stream. The transport layer forwards
    /// these to connected clients.
    pub async fn subscribe(&self, room: RoomId) -> broadcast::Receiver<RoomEvent> {
        self.rooms.subscribe(room).await
    }

    pub fn session_engine(&self) -> &Arc<GameSessionEngine> {
        &self.sessions
    }

    pub fn battle_engine(&self) -> &Arc<BattleEngine> {
        &self.battles
    }

    pub fn tournament_engine(&self) -> &Arc<TournamentEngine> {
        &self.tournaments
    }

    pub fn timers(&self) -> &Arc<TimerService> {
        &self.timers
    }
}
