//! One game session: the round state machine for a cohort of four.
//!
//! # Barriers
//!
//! Two of the round's steps are barriers built from [`Latch`]es and
//! [`Gate`]s:
//!
//! - **Night** (`WaitNight`) is a two-latch phase pair. The enter latch
//!   opens the night gate on the 4th arrival; every caller then applies the
//!   night's kill, arrives at the reveal latch and the exit latch, and the
//!   exit latch closes the gate again once all four have left.
//! - **Vote** is a single-latch signal followed by a clean-up latch: the
//!   voted latch opens the vote gate, the know-executed latch closes it and
//!   zeroes the tally.
//!
//! Arriving at a latch and taking a watch on its gate happen under the
//! session lock; the wait itself happens after the lock is released.
//!
//! # Side effects
//!
//! Each caller applies the kill (or execution) to the alive set itself,
//! idempotently, before it returns. So whichever of the four callers comes
//! back first, the alive set it goes on to query already reflects the
//! outcome.
//!
//! # Violations
//!
//! A call that breaks the round protocol abandons the session under the
//! same lock that detected it. Both gates break, so players already
//! waiting at a barrier are released with `SessionAbandoned` instead of
//! waiting for an arrival that will never come.

use std::time::Instant;

use nightfall_latch::{Gate, GateError, GateWatch, Latch};
use nightfall_protocol::{
    Faction, PlayerName, Role, RoleEntry, SessionId, COHORT_SIZE,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::{
    tally, Cohort, GameConfig, GameError, GameResult, SessionStatus, Slot,
    SlotSet, VoteTally,
};

/// What a player learns when the night ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightOutcome {
    /// Tonight's victim, if the Mafia designated one.
    pub killed: Option<PlayerName>,
    /// The Mafia, if the Detective revealed them tonight.
    pub revealed_mafia: Option<PlayerName>,
}

/// Answer to a terminal `GetRoles` read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolesRead {
    /// The full role table, in slot order.
    pub roles: Vec<RoleEntry>,
    /// `true` for the 4th reader: the session is now retired and should be
    /// dropped from the registry.
    pub retire: bool,
}

// ---------------------------------------------------------------------------
// Round state and latch callbacks
// ---------------------------------------------------------------------------

/// Everything the latches mutate.
#[derive(Debug)]
struct RoundState {
    session_id: SessionId,
    status: SessionStatus,
    alive: SlotSet,

    pending_kill: Option<Slot>,
    revealed_mafia: Option<Slot>,
    night_gate: Gate,
    night_entered: SlotSet,

    tally: VoteTally,
    vote_gate: Gate,
    ballots_cast: SlotSet,

    roles_read: SlotSet,
}

impl RoundState {
    fn abandon(&mut self) {
        self.status = SessionStatus::Abandoned;
        self.night_gate.break_gate();
        self.vote_gate.break_gate();
    }
}

fn open_night(round: &mut RoundState, _: ()) {
    round.night_gate.open();
}

fn clear_reveal(round: &mut RoundState, _: ()) {
    round.revealed_mafia = None;
}

fn close_night(round: &mut RoundState, _: ()) {
    round.night_gate.close();
    round.pending_kill = None;
    round.night_entered.clear();
    tracing::info!(
        session_id = %round.session_id,
        alive = round.alive.len(),
        "night resolved"
    );
}

fn open_vote(round: &mut RoundState, _: ()) {
    round.vote_gate.open();
}

fn close_vote(round: &mut RoundState, executed: Option<Slot>) {
    round.vote_gate.close();
    round.tally.clear();
    round.ballots_cast.clear();
    tracing::debug!(
        session_id = %round.session_id,
        executed = ?executed.map(Slot::index),
        "vote closed"
    );
}

fn retire(round: &mut RoundState, _: ()) {
    round.status = SessionStatus::Retired;
}

/// Lock-protected part of a session.
#[derive(Debug)]
struct SessionInner {
    round: RoundState,
    night_enter: Latch<RoundState>,
    reveal_seen: Latch<RoundState>,
    night_exit: Latch<RoundState>,
    voted: Latch<RoundState>,
    know_executed: Latch<RoundState, Option<Slot>>,
    retirement: Latch<RoundState>,
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// A running game for one cohort.
///
/// Shared between request tasks as `Arc<GameSession>`. The immutable parts
/// (players, roles) are read without locking; everything that changes
/// during the game sits behind one `tokio::sync::Mutex`.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    players: [PlayerName; COHORT_SIZE],
    roles: [Role; COHORT_SIZE],
    config: GameConfig,
    started_at: Instant,
    inner: Mutex<SessionInner>,
}

impl GameSession {
    /// Creates the session for `cohort`, dealing roles from a PRNG seeded
    /// with the session id.
    pub fn new(cohort: Cohort, config: GameConfig) -> Self {
        let id = cohort.session_id();
        let players = cohort.into_players();

        let mut roles = Role::DECK;
        let mut rng = StdRng::seed_from_u64(id.0);
        roles.shuffle(&mut rng);

        let round = RoundState {
            session_id: id,
            status: SessionStatus::InProgress,
            alive: SlotSet::full(),
            pending_kill: None,
            revealed_mafia: None,
            night_gate: Gate::new("night"),
            night_entered: SlotSet::empty(),
            tally: VoteTally::default(),
            vote_gate: Gate::new("vote"),
            ballots_cast: SlotSet::empty(),
            roles_read: SlotSet::empty(),
        };

        let inner = SessionInner {
            round,
            night_enter: Latch::new("night_enter", COHORT_SIZE, open_night),
            reveal_seen: Latch::new("reveal_seen", COHORT_SIZE, clear_reveal),
            night_exit: Latch::new("night_exit", COHORT_SIZE, close_night),
            voted: Latch::new("voted", COHORT_SIZE, open_vote),
            know_executed: Latch::new("know_executed", COHORT_SIZE, close_vote),
            retirement: Latch::new("retirement", COHORT_SIZE, retire),
        };

        tracing::info!(session_id = %id, players = ?players, "session created");

        Self {
            id,
            players,
            roles,
            config,
            started_at: Instant::now(),
            inner: Mutex::new(inner),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Players in slot (canonical) order.
    pub fn players(&self) -> &[PlayerName; COHORT_SIZE] {
        &self.players
    }

    /// Roles in slot order.
    pub fn roles(&self) -> &[Role; COHORT_SIZE] {
        &self.roles
    }

    /// The role dealt to `player`.
    pub fn role_of(&self, player: &PlayerName) -> Result<Role, GameError> {
        let slot = self.member(player)?;
        Ok(self.roles[slot.index()])
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.round.status
    }

    // -- Day ------------------------------------------------------------

    /// Whether `player`'s role has a night action (Mafia or Detective).
    ///
    /// Reads only the role table. An eliminated Mafia or Detective still
    /// gets `true`; the night actions themselves reject dead actors.
    pub fn query_day_action(&self, player: &PlayerName) -> Result<bool, GameError> {
        let slot = self.member(player)?;
        Ok(self.roles[slot.index()].acts_at_night())
    }

    /// Detective only: is `target` the Mafia?
    pub async fn inspect(
        &self,
        player: &PlayerName,
        target: &PlayerName,
    ) -> Result<bool, GameError> {
        let slot = self.acting_as(player, Role::Detective, "inspect")?;

        let mut inner = self.inner.lock().await;
        let round = &mut inner.round;
        self.ensure_live(round)?;
        let target = self.target(round, target)?;
        self.ensure_alive(round, slot)?;
        self.ensure_alive(round, target)?;

        let is_mafia = self.roles[target.index()] == Role::Mafia;
        tracing::debug!(session_id = %self.id, %player, suspect = %self.name(target), "inspected");
        Ok(is_mafia)
    }

    /// Detective only: tonight's outcome will name the Mafia to everyone.
    pub async fn reveal_mafia(&self, player: &PlayerName) -> Result<(), GameError> {
        let slot = self.acting_as(player, Role::Detective, "reveal the mafia")?;

        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner.round)?;
        self.ensure_alive(&mut inner.round, slot)?;

        inner.round.revealed_mafia = Slot::ALL
            .into_iter()
            .find(|s| self.roles[s.index()] == Role::Mafia);
        tracing::debug!(session_id = %self.id, %player, "mafia revealed");
        Ok(())
    }

    /// Mafia only: choose tonight's victim. The last designation before the
    /// night resolves wins.
    pub async fn designate_kill(
        &self,
        player: &PlayerName,
        target: &PlayerName,
    ) -> Result<(), GameError> {
        let slot = self.acting_as(player, Role::Mafia, "designate a kill")?;

        let mut inner = self.inner.lock().await;
        let round = &mut inner.round;
        self.ensure_live(round)?;
        let target = self.target(round, target)?;
        self.ensure_alive(round, slot)?;
        self.ensure_alive(round, target)?;

        round.pending_kill = Some(target);
        tracing::debug!(session_id = %self.id, %player, victim = %self.name(target), "kill designated");
        Ok(())
    }

    // -- Night barrier --------------------------------------------------

    /// Waits until all four players have called `wait_night` for this
    /// round, then reports the night's outcome.
    ///
    /// Every player calls this each round, alive or not.
    pub async fn wait_night(
        &self,
        player: &PlayerName,
    ) -> Result<NightOutcome, GameError> {
        let slot = self.member(player)?;

        let watch = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            self.ensure_live(&inner.round)?;

            if !inner.round.night_entered.insert(slot) {
                return Err(self.violation(&mut inner.round, format!(
                    "{player} is already waiting for the night to end"
                )));
            }

            inner.night_enter.arrive(&mut inner.round, ());
            inner.round.night_gate.watch()
        };

        self.pass(watch).await?;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.ensure_live(&inner.round)?;

        let killed = inner.round.pending_kill;
        if let Some(victim) = killed {
            if inner.round.alive.remove(victim) {
                tracing::info!(
                    session_id = %self.id,
                    player = %self.name(victim),
                    round = inner.night_exit.rounds() + 1,
                    "player killed"
                );
            }
        }
        let revealed = inner.round.revealed_mafia;

        inner.reveal_seen.arrive(&mut inner.round, ());
        inner.night_exit.arrive(&mut inner.round, ());

        Ok(NightOutcome {
            killed: killed.map(|s| self.name(s).clone()),
            revealed_mafia: revealed.map(|s| self.name(s).clone()),
        })
    }

    /// Players still alive, in canonical order.
    pub async fn query_alive(
        &self,
        player: &PlayerName,
    ) -> Result<Vec<PlayerName>, GameError> {
        self.member(player)?;
        let inner = self.inner.lock().await;
        self.ensure_live(&inner.round)?;

        Ok(inner
            .round
            .alive
            .iter()
            .map(|s| self.name(s).clone())
            .collect())
    }

    // -- Vote barrier ---------------------------------------------------

    /// Casts `player`'s ballot (`None` abstains) and waits for the other
    /// three. Returns the executed player, if the vote had a unique leader.
    ///
    /// # Errors
    /// [`GameError::InvariantViolation`] for a second ballot in the same
    /// round, a ballot for an unknown or eliminated player, or a ballot
    /// cast by an eliminated player. Any of these abandons the session.
    pub async fn vote(
        &self,
        player: &PlayerName,
        ballot: Option<&PlayerName>,
    ) -> Result<Option<PlayerName>, GameError> {
        let slot = self.member(player)?;

        let watch = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            self.ensure_live(&inner.round)?;

            let candidate = match ballot {
                Some(b) => Some(self.target(&mut inner.round, b)?),
                None => None,
            };
            if let Some(candidate) = candidate {
                if !inner.round.alive.contains(slot) {
                    return Err(self.violation(&mut inner.round, format!(
                        "{player} is eliminated and must abstain"
                    )));
                }
                self.ensure_alive(&mut inner.round, candidate)?;
            }

            if !inner.round.ballots_cast.insert(slot) {
                return Err(self.violation(&mut inner.round, format!(
                    "{player} has already voted this round"
                )));
            }

            if let Some(candidate) = candidate {
                inner.round.tally.add(candidate);
            }
            inner.voted.arrive(&mut inner.round, ());
            inner.round.vote_gate.watch()
        };

        self.pass(watch).await?;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.ensure_live(&inner.round)?;

        let executed = inner.round.tally.winner();
        if let Some(victim) = executed {
            if inner.round.alive.remove(victim) {
                tracing::info!(
                    session_id = %self.id,
                    player = %self.name(victim),
                    round = inner.know_executed.rounds() + 1,
                    "player executed"
                );
            }
        }
        inner.know_executed.arrive(&mut inner.round, executed);

        Ok(executed.map(|s| self.name(s).clone()))
    }

    /// The winning faction, if the game is over.
    pub async fn check_winner(
        &self,
        player: &PlayerName,
    ) -> Result<Option<Faction>, GameError> {
        self.member(player)?;
        let inner = self.inner.lock().await;
        self.ensure_live(&inner.round)?;

        Ok(tally::winner(&self.roles, &inner.round.alive))
    }

    // -- End of game ----------------------------------------------------

    /// Terminal read: the full role table. The 4th distinct reader retires
    /// the session.
    pub async fn read_roles(
        &self,
        player: &PlayerName,
    ) -> Result<RolesRead, GameError> {
        let slot = self.member(player)?;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.ensure_live(&inner.round)?;

        if !inner.round.roles_read.insert(slot) {
            return Err(self.violation(
                &mut inner.round,
                format!("{player} has already read the roles"),
            ));
        }

        let retire = inner.retirement.arrive(&mut inner.round, ()).is_trigger();
        if retire {
            tracing::info!(
                session_id = %self.id,
                elapsed_ms = self.started_at.elapsed().as_millis() as u64,
                "session retired"
            );
        }

        Ok(RolesRead {
            roles: self.role_table(),
            retire,
        })
    }

    /// Summary of the game so far, for the result sink.
    pub async fn outcome(&self) -> GameResult {
        let inner = self.inner.lock().await;
        let winner = tally::winner(&self.roles, &inner.round.alive);

        GameResult {
            session_id: self.id,
            winner,
            duration: self.started_at.elapsed(),
            nights: inner.night_exit.rounds(),
            players: GameResult::outcomes(
                self.players.iter().zip(self.roles),
                winner,
            ),
        }
    }

    // -- Helpers --------------------------------------------------------

    fn role_table(&self) -> Vec<RoleEntry> {
        self.players
            .iter()
            .zip(self.roles)
            .map(|(player, role)| RoleEntry {
                player: player.clone(),
                role,
            })
            .collect()
    }

    fn name(&self, slot: Slot) -> &PlayerName {
        &self.players[slot.index()]
    }

    fn slot_of(&self, player: &PlayerName) -> Option<Slot> {
        self.players.binary_search(player).ok().and_then(Slot::new)
    }

    /// The caller's slot. Unknown callers are `PlayerNotFound`.
    fn member(&self, player: &PlayerName) -> Result<Slot, GameError> {
        self.slot_of(player).ok_or_else(|| GameError::PlayerNotFound {
            session_id: self.id,
            player: player.clone(),
        })
    }

    /// A target named in a call. Unknown targets break the protocol.
    fn target(&self, round: &mut RoundState, target: &PlayerName) -> Result<Slot, GameError> {
        match self.slot_of(target) {
            Some(slot) => Ok(slot),
            None => Err(self.violation(round, format!("{target} is not in this game"))),
        }
    }

    fn acting_as(
        &self,
        player: &PlayerName,
        role: Role,
        action: &'static str,
    ) -> Result<Slot, GameError> {
        let slot = self.member(player)?;
        let actual = self.roles[slot.index()];
        if actual != role {
            tracing::warn!(session_id = %self.id, %player, role = %actual, action, "wrong role");
            return Err(GameError::WrongRole {
                player: player.clone(),
                role: actual,
                action,
            });
        }
        Ok(slot)
    }

    fn ensure_live(&self, round: &RoundState) -> Result<(), GameError> {
        if round.status.is_live() {
            Ok(())
        } else {
            Err(GameError::SessionAbandoned(self.id))
        }
    }

    fn ensure_alive(&self, round: &mut RoundState, slot: Slot) -> Result<(), GameError> {
        if round.alive.contains(slot) {
            Ok(())
        } else {
            Err(self.violation(round, format!("{} has been eliminated", self.name(slot))))
        }
    }

    /// Abandons the session and builds the error for the offending caller.
    fn violation(&self, round: &mut RoundState, reason: String) -> GameError {
        tracing::warn!(session_id = %self.id, %reason, "protocol violation, abandoning session");
        round.abandon();
        GameError::InvariantViolation {
            session_id: self.id,
            reason,
        }
    }

    /// Waits on a barrier gate, bounded by the round timeout.
    ///
    /// The first waiter to time out abandons the session, which breaks
    /// both gates and releases everyone else with `SessionAbandoned`.
    async fn pass(&self, watch: GateWatch) -> Result<(), GameError> {
        match watch.opened_within(self.config.round_timeout).await {
            Ok(()) => Ok(()),
            Err(GateError::Broken(_)) => Err(GameError::SessionAbandoned(self.id)),
            Err(GateError::TimedOut { gate, after }) => {
                let mut inner = self.inner.lock().await;
                if inner.round.status.is_live() {
                    tracing::warn!(
                        session_id = %self.id,
                        gate,
                        after_ms = after.as_millis() as u64,
                        "round timed out, abandoning session"
                    );
                    inner.round.abandon();
                }
                Err(GameError::RoundTimeout {
                    session_id: self.id,
                    gate,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GameSession {
        let cohort: Vec<PlayerName> =
            vec!["dan".into(), "cat".into(), "bob".into(), "ann".into()];
        GameSession::new(
            Cohort::canonical(&"ann".into(), &cohort).unwrap(),
            GameConfig::default(),
        )
    }

    fn with_role(s: &GameSession, role: Role) -> PlayerName {
        s.players()
            .iter()
            .zip(s.roles())
            .find(|(_, r)| **r == role)
            .map(|(p, _)| p.clone())
            .unwrap()
    }

    fn civilians(s: &GameSession) -> Vec<PlayerName> {
        s.players()
            .iter()
            .zip(s.roles())
            .filter(|(_, r)| **r == Role::Civilian)
            .map(|(p, _)| p.clone())
            .collect()
    }

    #[test]
    fn test_role_multiset_is_fixed() {
        let s = session();
        let count = |role| s.roles().iter().filter(|r| **r == role).count();
        assert_eq!(count(Role::Mafia), 1);
        assert_eq!(count(Role::Detective), 1);
        assert_eq!(count(Role::Civilian), 2);
    }

    #[test]
    fn test_roles_are_deterministic_per_cohort() {
        assert_eq!(session().roles(), session().roles());
    }

    #[test]
    fn test_query_day_action_by_role() {
        let s = session();
        let mafia = with_role(&s, Role::Mafia);
        let detective = with_role(&s, Role::Detective);
        let civilian = civilians(&s).remove(0);

        assert!(s.query_day_action(&mafia).unwrap());
        assert!(s.query_day_action(&detective).unwrap());
        assert!(!s.query_day_action(&civilian).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_player_is_not_found() {
        let s = session();
        let err = s.query_alive(&"eve".into()).await.unwrap_err();
        assert!(matches!(err, GameError::PlayerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_inspect_finds_mafia() {
        let s = session();
        let mafia = with_role(&s, Role::Mafia);
        let detective = with_role(&s, Role::Detective);
        let civilian = civilians(&s).remove(0);

        assert!(s.inspect(&detective, &mafia).await.unwrap());
        assert!(!s.inspect(&detective, &civilian).await.unwrap());
    }

    #[tokio::test]
    async fn test_civilian_cannot_inspect() {
        let s = session();
        let civilian = civilians(&s).remove(0);
        let mafia = with_role(&s, Role::Mafia);

        let err = s.inspect(&civilian, &mafia).await.unwrap_err();
        assert_eq!(err.code(), 403);
    }

    #[tokio::test]
    async fn test_detective_cannot_designate_kill() {
        let s = session();
        let detective = with_role(&s, Role::Detective);
        let civilian = civilians(&s).remove(0);

        let err = s.designate_kill(&detective, &civilian).await.unwrap_err();
        assert!(matches!(err, GameError::WrongRole { role: Role::Detective, .. }));
    }

    #[tokio::test]
    async fn test_designate_kill_unknown_target_is_violation() {
        let s = session();
        let mafia = with_role(&s, Role::Mafia);
        let err = s.designate_kill(&mafia, &"eve".into()).await.unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation { .. }));
        assert_eq!(s.status().await, SessionStatus::Abandoned);

        let err = s.query_alive(&mafia).await.unwrap_err();
        assert!(matches!(err, GameError::SessionAbandoned(_)));
    }

    #[tokio::test]
    async fn test_duplicate_night_arrival_releases_first_call() {
        let s = session();
        let ann = PlayerName::from("ann");

        let first = {
            let s = &s;
            let ann = ann.clone();
            async move { s.wait_night(&ann).await }
        };
        tokio::pin!(first);

        // Drive the first call up to its gate wait.
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), &mut first)
                .await
                .is_err()
        );

        let err = s.wait_night(&ann).await.unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation { .. }));

        let first = first.await.unwrap_err();
        assert!(matches!(first, GameError::SessionAbandoned(_)));
    }

    #[tokio::test]
    async fn test_alive_listed_in_canonical_order() {
        let s = session();
        let alive = s.query_alive(&"cat".into()).await.unwrap();
        let expected: Vec<PlayerName> =
            vec!["ann".into(), "bob".into(), "cat".into(), "dan".into()];
        assert_eq!(alive, expected);
    }

    #[tokio::test]
    async fn test_read_roles_retires_on_fourth_reader() {
        let s = session();
        for (i, p) in s.players().clone().iter().enumerate() {
            let read = s.read_roles(p).await.unwrap();
            assert_eq!(read.roles.len(), 4);
            assert_eq!(read.retire, i == 3);
        }
        assert_eq!(s.status().await, SessionStatus::Retired);
    }

    #[tokio::test]
    async fn test_read_roles_twice_is_violation() {
        let s = session();
        s.read_roles(&"ann".into()).await.unwrap();
        let err = s.read_roles(&"ann".into()).await.unwrap_err();
        assert_eq!(err.code(), 409);
    }
}
