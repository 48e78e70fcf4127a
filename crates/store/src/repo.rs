//! Repository contracts, aggregate-granular.
//!
//! Each trait reads and writes whole aggregates so a backing store can keep
//! multi-row writes transactional: a battle is created together with its two
//! participants and its question snapshot in one call.

use async_trait::async_trait;

use quizlive_core::battle::Battle;
use quizlive_core::error::CoreError;
use quizlive_core::quiz::QuizQuestion;
use quizlive_core::session::GameSession;
use quizlive_core::tournament::Tournament;
use quizlive_core::types::DbId;

/// Read access to quiz content.
#[async_trait]
pub trait QuizRepo: Send + Sync {
    /// Questions of a quiz in stable creation order. The order must not
    /// change across calls for the same quiz.
    async fn questions(&self, quiz_id: DbId) -> Result<Vec<QuizQuestion>, CoreError>;
}

/// Game session persistence.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Persist a new session, assigning its id.
    async fn create(&self, session: GameSession) -> Result<GameSession, CoreError>;

    async fn get(&self, id: DbId) -> Result<GameSession, CoreError>;

    /// The session at `pin` that is currently in the lobby or actively
    /// playing, if any. Finished sessions release their pin.
    async fn find_active_by_pin(&self, pin: &str) -> Result<Option<GameSession>, CoreError>;

    /// Whether any lobby/active session holds `pin`.
    async fn pin_in_use(&self, pin: &str) -> Result<bool, CoreError>;

    /// Replace the stored aggregate.
    async fn save(&self, session: GameSession) -> Result<(), CoreError>;

    /// Allocate an id for a child row added after creation (a joining
    /// player).
    async fn allocate_id(&self) -> Result<DbId, CoreError>;
}

/// Battle persistence.
#[async_trait]
pub trait BattleRepo: Send + Sync {
    /// Persist a new battle together with its participants and question
    /// snapshot, assigning ids to all of them.
    async fn create(&self, battle: Battle) -> Result<Battle, CoreError>;

    async fn get(&self, id: DbId) -> Result<Battle, CoreError>;

    /// Replace the stored aggregate.
    async fn save(&self, battle: Battle) -> Result<(), CoreError>;
}

/// Tournament persistence.
#[async_trait]
pub trait TournamentRepo: Send + Sync {
    /// Persist a new tournament, assigning its id.
    async fn create(&self, tournament: Tournament) -> Result<Tournament, CoreError>;

    async fn get(&self, id: DbId) -> Result<Tournament, CoreError>;

    /// Replace the stored aggregate.
    async fn save(&self, tournament: Tournament) -> Result<(), CoreError>;

    /// Allocate an id for a child row added after creation (a joining
    /// participant).
    async fn allocate_id(&self) -> Result<DbId, CoreError>;
}
