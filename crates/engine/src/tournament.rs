//! Tournament engine: registration, bracket generation, standings.
//!
//! Rounds beyond the first are an explicit extension point: the engine
//! pairs a flat shuffle of the field and spawns round-1 battles, and the
//! bracket-advancement algorithm for later rounds is intentionally not
//! guessed at here.

use std::sync::Arc;

use serde::Deserialize;

use quizlive_core::battle::Battle;
use quizlive_core::error::CoreError;
use quizlive_core::tournament::{
    assign_final_ranks, pair_participants, BracketType, Pairing, Tournament, TournamentParticipant,
    TournamentSettings, TournamentStatus,
};
use quizlive_core::types::DbId;
use quizlive_events::{RoomBroadcaster, RoomEvent, RoomId};
use quizlive_store::TournamentRepo;

use crate::battle::BattleEngine;
use crate::lock::AggregateLocks;

fn tournament_key(id: DbId) -> String {
    format!("tournament:{id}")
}

/// Input for creating a tournament.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournament {
    pub name: String,
    pub bracket_type: BracketType,
    pub max_participants: u32,
    pub quiz_id: DbId,
    #[serde(default)]
    pub settings: TournamentSettings,
}

/// Drives the upcoming → registration → active → finished lifecycle of
/// every tournament.
pub struct TournamentEngine {
    tournaments: Arc<dyn TournamentRepo>,
    battles: Arc<BattleEngine>,
    rooms: Arc<RoomBroadcaster>,
    locks: Arc<AggregateLocks>,
}

impl TournamentEngine {
    pub fn new(
        tournaments: Arc<dyn TournamentRepo>,
        battles: Arc<BattleEngine>,
        rooms: Arc<RoomBroadcaster>,
        locks: Arc<AggregateLocks>,
    ) -> Self {
        Self {
            tournaments,
            battles,
            rooms,
            locks,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    pub async fn create(&self, input: CreateTournament) -> Result<Tournament, CoreError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("tournament name must not be empty".into()));
        }
        if input.max_participants < 2 {
            return Err(CoreError::Validation(
                "a tournament needs room for at least 2 participants".into(),
            ));
        }

        let tournament = self
            .tournaments
            .create(Tournament::new(
                name.to_string(),
                input.bracket_type,
                input.max_participants,
                input.quiz_id,
                input.settings,
            ))
            .await?;
        tracing::info!(
            tournament_id = tournament.id,
            max_participants = tournament.max_participants,
            "Tournament created",
        );
        Ok(tournament)
    }

    /// Open registration for an upcoming tournament.
    pub async fn open_registration(&self, id: DbId) -> Result<Tournament, CoreError> {
        let _guard = self.locks.acquire(&tournament_key(id)).await;
        let mut tournament = self.tournaments.get(id).await?;
        if !tournament
            .status
            .can_transition(TournamentStatus::Registration)
        {
            return Err(CoreError::State(format!(
                "cannot open registration in status {:?}",
                tournament.status
            )));
        }
        tournament.status = TournamentStatus::Registration;
        self.tournaments.save(tournament.clone()).await?;
        Ok(tournament)
    }

    /// Register a user. Insert and counter increment run under the
    /// tournament's lock, so the capacity cap holds under concurrent joins.
    pub async fn join(&self, id: DbId, user_id: DbId) -> Result<TournamentParticipant, CoreError> {
        let _guard = self.locks.acquire(&tournament_key(id)).await;
        let mut tournament = self.tournaments.get(id).await?;
        if !tournament.status.accepts_registrations() {
            return Err(CoreError::State(format!(
                "registration is closed (status {:?})",
                tournament.status
            )));
        }
        if tournament.is_full() {
            return Err(CoreError::Conflict("tournament is full".into()));
        }
        if tournament.has_user(user_id) {
            return Err(CoreError::Conflict(format!(
                "user {user_id} already joined this tournament"
            )));
        }

        let mut participant = TournamentParticipant::new(id, user_id);
        participant.id = self.tournaments.allocate_id().await?;
        tournament.participants.push(participant.clone());
        tournament.current_participants += 1;
        self.tournaments.save(tournament).await?;

        tracing::debug!(tournament_id = id, user_id, "Participant joined");
        Ok(participant)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub async fn start(&self, id: DbId) -> Result<Tournament, CoreError> {
        let _guard = self.locks.acquire(&tournament_key(id)).await;
        let mut tournament = self.tournaments.get(id).await?;
        if !tournament.status.can_transition(TournamentStatus::Active) {
            return Err(CoreError::State(format!(
                "cannot start a tournament in status {:?}",
                tournament.status
            )));
        }
        tournament.status = TournamentStatus::Active;
        self.tournaments.save(tournament.clone()).await?;

        self.rooms
            .publish(
                &RoomId::Tournament(id),
                RoomEvent::TournamentStarted { tournament_id: id },
            )
            .await;
        tracing::info!(tournament_id = id, "Tournament started");
        Ok(tournament)
    }

    /// Pair the field and spawn one round-1 battle per pair. An odd field
    /// leaves the trailing participant out of the round.
    pub async fn generate_brackets(&self, id: DbId) -> Result<Vec<Battle>, CoreError> {
        let pairing: Pairing = {
            let _guard = self.locks.acquire(&tournament_key(id)).await;
            let tournament = self.tournaments.get(id).await?;
            if tournament.status != TournamentStatus::Active {
                return Err(CoreError::State(format!(
                    "cannot generate brackets in status {:?}",
                    tournament.status
                )));
            }
            if tournament.participants.len() < 2 {
                return Err(CoreError::State(
                    "bracket generation needs at least 2 participants".into(),
                ));
            }

            let user_ids: Vec<DbId> =
                tournament.participants.iter().map(|p| p.user_id).collect();
            let mut rng = rand::rng();
            pair_participants(&mut rng, &user_ids)
        };

        if let Some(user_id) = pairing.unpaired {
            tracing::warn!(tournament_id = id, user_id, "Participant left unpaired this round");
        }

        let mut battles = Vec::with_capacity(pairing.pairs.len());
        for (player1, player2) in pairing.pairs {
            battles.push(self.battles.create(id, player1, player2, 1).await?);
        }
        tracing::info!(tournament_id = id, battles = battles.len(), "Brackets generated");
        Ok(battles)
    }

    /// Close out an active tournament, ranking the field behind the winner.
    pub async fn finish(&self, id: DbId, winner_user_id: DbId) -> Result<Tournament, CoreError> {
        let _guard = self.locks.acquire(&tournament_key(id)).await;
        let mut tournament = self.tournaments.get(id).await?;
        if !tournament.status.can_transition(TournamentStatus::Finished) {
            return Err(CoreError::State(format!(
                "cannot finish a tournament in status {:?}",
                tournament.status
            )));
        }
        if !tournament.has_user(winner_user_id) {
            return Err(CoreError::not_found("tournament participant", winner_user_id));
        }

        assign_final_ranks(&mut tournament.participants, winner_user_id);
        tournament.status = TournamentStatus::Finished;
        self.tournaments.save(tournament.clone()).await?;

        let room = RoomId::Tournament(id);
        self.rooms
            .publish(
                &room,
                RoomEvent::TournamentEnded {
                    winner_id: Some(winner_user_id),
                },
            )
            .await;
        self.rooms.close(&room).await;
        self.locks.discard(&tournament_key(id)).await;
        tracing::info!(tournament_id = id, winner_user_id, "Tournament finished");
        Ok(tournament)
    }

    /// Cancel a tournament that has not gone active yet.
    pub async fn cancel(&self, id: DbId) -> Result<Tournament, CoreError> {
        let _guard = self.locks.acquire(&tournament_key(id)).await;
        let mut tournament = self.tournaments.get(id).await?;
        if !tournament.status.can_transition(TournamentStatus::Cancelled) {
            return Err(CoreError::State(format!(
                "cannot cancel a tournament in status {:?}",
                tournament.status
            )));
        }
        tournament.status = TournamentStatus::Cancelled;
        self.tournaments.save(tournament.clone()).await?;

        self.rooms.close(&RoomId::Tournament(id)).await;
        self.locks.discard(&tournament_key(id)).await;
        tracing::info!(tournament_id = id, "Tournament cancelled");
        Ok(tournament)
    }
}
