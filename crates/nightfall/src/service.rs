//! The RPC facade: one method per remote call.
//!
//! `MafiaService` owns the lobby, the session registry and the result
//! sink. It is shared between every connection task as an `Arc`. Methods
//! hold the registry lock long enough to look a session up (`GetRoles`
//! also keeps it through the read that may retire the session); the
//! barrier waits happen on the session itself.
//!
//! Lock order is registry, then session. Nothing takes the registry lock
//! while holding a session lock.

use std::sync::Arc;

use nightfall_game::{
    GameConfig, GameError, GameSession, LogResultSink, ResultSink, SessionRegistry,
};
use nightfall_lobby::{Lobby, Membership};
use nightfall_protocol::{
    Call, Faction, PlayerName, ProtocolError, Reply, Role, RoleEntry, SessionId,
};
use tokio::sync::Mutex;

use crate::NightfallError;

/// Shared server state and call routing.
pub struct MafiaService {
    lobby: Lobby,
    registry: Mutex<SessionRegistry>,
    results: Arc<dyn ResultSink>,
}

impl Default for MafiaService {
    fn default() -> Self {
        Self::new(GameConfig::default(), Arc::new(LogResultSink))
    }
}

impl MafiaService {
    pub fn new(config: GameConfig, results: Arc<dyn ResultSink>) -> Self {
        Self {
            lobby: Lobby::new(),
            registry: Mutex::new(SessionRegistry::new(config)),
            results,
        }
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// Number of live game sessions.
    pub async fn live_sessions(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn has_session(&self, session_id: SessionId) -> bool {
        self.registry.lock().await.contains(session_id)
    }

    // -- Lobby ----------------------------------------------------------

    pub async fn join(&self, player: PlayerName) -> Result<Membership, NightfallError> {
        Ok(self.lobby.join(player).await?)
    }

    pub async fn leave(&self, player: &PlayerName) -> Result<(), NightfallError> {
        Ok(self.lobby.leave(player).await?)
    }

    // -- Session setup --------------------------------------------------

    pub async fn start_game(
        &self,
        player: &PlayerName,
        cohort: &[PlayerName],
    ) -> Result<(SessionId, Role), NightfallError> {
        let (session, role) = self.registry.lock().await.start_game(player, cohort)?;
        Ok((session.id(), role))
    }

    // -- Rounds ---------------------------------------------------------

    pub async fn query_day_action(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<bool, NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.query_day_action(player))
            .await
    }

    pub async fn inspect(
        &self,
        session_id: SessionId,
        player: &PlayerName,
        target: &PlayerName,
    ) -> Result<bool, NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.inspect(player, target).await)
            .await
    }

    pub async fn reveal_mafia(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<(), NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.reveal_mafia(player).await)
            .await
    }

    pub async fn designate_kill(
        &self,
        session_id: SessionId,
        player: &PlayerName,
        target: &PlayerName,
    ) -> Result<(), NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.designate_kill(player, target).await)
            .await
    }

    /// Blocks until all four players have called it for this round.
    pub async fn wait_night(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<(Option<PlayerName>, Option<PlayerName>), NightfallError> {
        let session = self.session(session_id).await?;
        let outcome = self
            .settle(session_id, session.wait_night(player).await)
            .await?;
        Ok((outcome.killed, outcome.revealed_mafia))
    }

    pub async fn query_alive(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<Vec<PlayerName>, NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.query_alive(player).await)
            .await
    }

    /// Casts a ballot and blocks until all four have voted. An empty ballot
    /// abstains, same as a missing one.
    pub async fn vote(
        &self,
        session_id: SessionId,
        player: &PlayerName,
        ballot: Option<&PlayerName>,
    ) -> Result<Option<PlayerName>, NightfallError> {
        let ballot = ballot.filter(|b| !b.is_empty());
        let session = self.session(session_id).await?;
        self.settle(session_id, session.vote(player, ballot).await)
            .await
    }

    pub async fn check_winner(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<Option<Faction>, NightfallError> {
        let session = self.session(session_id).await?;
        self.settle(session_id, session.check_winner(player).await)
            .await
    }

    /// Terminal read. The 4th distinct caller retires the session and
    /// reports the result.
    ///
    /// The registry lock is held across the read, so a retired session is
    /// never visible to `StartGame`.
    pub async fn get_roles(
        &self,
        session_id: SessionId,
        player: &PlayerName,
    ) -> Result<Vec<RoleEntry>, NightfallError> {
        let (session, read) = {
            let mut registry = self.registry.lock().await;
            let session = registry.get(session_id)?;
            let read = match session.read_roles(player).await {
                Ok(read) => read,
                Err(e) => {
                    if e.is_fatal() {
                        registry.remove(session_id);
                    }
                    return Err(e.into());
                }
            };
            if read.retire {
                registry.remove(session_id);
            }
            (session, read)
        };

        if read.retire {
            let result = session.outcome().await;
            self.results.record(&result);
        }

        Ok(read.roles)
    }

    // -- Dispatch -------------------------------------------------------

    /// Runs a single-reply call and turns the outcome into a [`Reply`].
    ///
    /// `Join` streams several replies and is driven by the connection
    /// handler instead; passed here it is rejected.
    pub async fn call(&self, call: Call) -> Reply {
        let result: Result<Reply, NightfallError> = match call {
            Call::Join { .. } => Err(ProtocolError::InvalidMessage(
                "Join is a streaming call".into(),
            )
            .into()),
            Call::Leave { player } => self.leave(&player).await.map(|()| Reply::Left),
            Call::StartGame { player, cohort } => self
                .start_game(&player, &cohort)
                .await
                .map(|(session_id, role)| Reply::GameStarted { session_id, role }),
            Call::QueryDayAction { session_id, player } => self
                .query_day_action(session_id, &player)
                .await
                .map(|acts| Reply::DayAction { acts }),
            Call::Inspect {
                session_id,
                player,
                target,
            } => self
                .inspect(session_id, &player, &target)
                .await
                .map(|is_mafia| Reply::Inspected { is_mafia }),
            Call::RevealMafia { session_id, player } => self
                .reveal_mafia(session_id, &player)
                .await
                .map(|()| Reply::Revealed),
            Call::DesignateKill {
                session_id,
                player,
                target,
            } => self
                .designate_kill(session_id, &player, &target)
                .await
                .map(|()| Reply::KillDesignated),
            Call::WaitNight { session_id, player } => self
                .wait_night(session_id, &player)
                .await
                .map(|(killed, revealed_mafia)| Reply::NightResolved {
                    killed,
                    revealed_mafia,
                }),
            Call::QueryAlive { session_id, player } => self
                .query_alive(session_id, &player)
                .await
                .map(|players| Reply::Alive { players }),
            Call::Vote {
                session_id,
                player,
                ballot,
            } => self
                .vote(session_id, &player, ballot.as_ref())
                .await
                .map(|executed| Reply::Voted { executed }),
            Call::CheckWinner { session_id, player } => self
                .check_winner(session_id, &player)
                .await
                .map(|faction| Reply::Winner { faction }),
            Call::GetRoles { session_id, player } => self
                .get_roles(session_id, &player)
                .await
                .map(|roles| Reply::Roles { roles }),
        };

        result.unwrap_or_else(|e| e.to_reply())
    }

    // -- Helpers --------------------------------------------------------

    async fn session(&self, session_id: SessionId) -> Result<Arc<GameSession>, GameError> {
        self.registry.lock().await.get(session_id)
    }

    /// Passes a session result through, evicting the session first if the
    /// error means it can't continue.
    async fn settle<T>(
        &self,
        session_id: SessionId,
        result: Result<T, GameError>,
    ) -> Result<T, NightfallError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.registry.lock().await.remove(session_id);
            }
        }
        Ok(result?)
    }
}
