//! In-memory reference store.
//!
//! Thread-safe via interior `RwLock`s; designed to be wrapped in `Arc` and
//! shared across the engines. Aggregates are stored whole, so the
//! multi-row battle create is naturally atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use quizlive_core::battle::Battle;
use quizlive_core::error::CoreError;
use quizlive_core::quiz::QuizQuestion;
use quizlive_core::session::{GameSession, SessionStatus};
use quizlive_core::tournament::Tournament;
use quizlive_core::types::DbId;

use crate::repo::{BattleRepo, QuizRepo, SessionRepo, TournamentRepo};

/// In-memory store backing all four repository contracts.
pub struct MemoryStore {
    next_id: AtomicI64,
    quizzes: RwLock<HashMap<DbId, Vec<QuizQuestion>>>,
    sessions: RwLock<HashMap<DbId, GameSession>>,
    battles: RwLock<HashMap<DbId, Battle>>,
    tournaments: RwLock<HashMap<DbId, Tournament>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            quizzes: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            battles: RwLock::new(HashMap::new()),
            tournaments: RwLock::new(HashMap::new()),
        }
    }

    fn alloc(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Seed a quiz, assigning question ids. Returns the quiz id.
    pub async fn insert_quiz(&self, mut questions: Vec<QuizQuestion>) -> DbId {
        let quiz_id = self.alloc();
        for question in &mut questions {
            question.id = self.alloc();
        }
        tracing::debug!(quiz_id, questions = questions.len(), "Quiz seeded");
        self.quizzes.write().await.insert(quiz_id, questions);
        quiz_id
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizRepo for MemoryStore {
    async fn questions(&self, quiz_id: DbId) -> Result<Vec<QuizQuestion>, CoreError> {
        self.quizzes
            .read()
            .await
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("quiz", quiz_id))
    }
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn create(&self, mut session: GameSession) -> Result<GameSession, CoreError> {
        session.id = self.alloc();
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: DbId) -> Result<GameSession, CoreError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("game session", id))
    }

    async fn find_active_by_pin(&self, pin: &str) -> Result<Option<GameSession>, CoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.pin == pin && !s.status.is_terminal())
            .cloned())
    }

    async fn pin_in_use(&self, pin: &str) -> Result<bool, CoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .any(|s| s.pin == pin && !s.status.is_terminal()))
    }

    async fn save(&self, session: GameSession) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(CoreError::not_found("game session", session.id));
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn allocate_id(&self) -> Result<DbId, CoreError> {
        Ok(self.alloc())
    }
}

#[async_trait]
impl BattleRepo for MemoryStore {
    async fn create(&self, mut battle: Battle) -> Result<Battle, CoreError> {
        battle.id = self.alloc();
        for participant in &mut battle.participants {
            participant.id = self.alloc();
            participant.battle_id = battle.id;
        }
        for question in &mut battle.questions {
            question.id = self.alloc();
            question.battle_id = battle.id;
        }
        self.battles.write().await.insert(battle.id, battle.clone());
        Ok(battle)
    }

    async fn get(&self, id: DbId) -> Result<Battle, CoreError> {
        self.battles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("battle", id))
    }

    async fn save(&self, battle: Battle) -> Result<(), CoreError> {
        let mut battles = self.battles.write().await;
        if !battles.contains_key(&battle.id) {
            return Err(CoreError::not_found("battle", battle.id));
        }
        battles.insert(battle.id, battle);
        Ok(())
    }
}

#[async_trait]
impl TournamentRepo for MemoryStore {
    async fn create(&self, mut tournament: Tournament) -> Result<Tournament, CoreError> {
        tournament.id = self.alloc();
        self.tournaments
            .write()
            .await
            .insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn get(&self, id: DbId) -> Result<Tournament, CoreError> {
        self.tournaments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("tournament", id))
    }

    async fn save(&self, tournament: Tournament) -> Result<(), CoreError> {
        let mut tournaments = self.tournaments.write().await;
        if !tournaments.contains_key(&tournament.id) {
            return Err(CoreError::not_found("tournament", tournament.id));
        }
        tournaments.insert(tournament.id, tournament);
        Ok(())
    }

    async fn allocate_id(&self) -> Result<DbId, CoreError> {
        Ok(self.alloc())
    }
}
