//! Session registry: maps session ids to live game sessions.

use std::collections::HashMap;
use std::sync::Arc;

use nightfall_protocol::{PlayerName, Role, SessionId};

use crate::{Cohort, GameConfig, GameError, GameSession};

/// Tracks every live game session.
///
/// Not thread-safe on its own: the server wraps it in a
/// `tokio::sync::Mutex` and holds that lock for map operations and the
/// terminal read that retires a session. Each session is handed out as an
/// `Arc`, so the (possibly long) barrier waits happen on the session
/// without the registry lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Arc<GameSession>>,
    config: GameConfig,
}

impl SessionRegistry {
    /// Creates an empty registry. Every session it creates uses `config`.
    pub fn new(config: GameConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Finds or creates the session for `cohort` and returns `player`'s
    /// role in it.
    ///
    /// The first member of a cohort to call this creates the session; the
    /// other three find it by the same derived id.
    ///
    /// # Errors
    /// [`GameError::InvalidCohort`] if `cohort` isn't four distinct,
    /// non-empty names that include `player`.
    pub fn start_game(
        &mut self,
        player: &PlayerName,
        cohort: &[PlayerName],
    ) -> Result<(Arc<GameSession>, Role), GameError> {
        let cohort = Cohort::canonical(player, cohort)?;
        let session_id = cohort.session_id();

        let session = match self.sessions.get(&session_id) {
            Some(existing) => Arc::clone(existing),
            None => {
                let session = Arc::new(GameSession::new(cohort, self.config.clone()));
                self.sessions.insert(session_id, Arc::clone(&session));
                session
            }
        };

        let role = session.role_of(player)?;
        tracing::info!(%session_id, %player, "player started game");
        Ok((session, role))
    }

    /// Returns the live session with this id.
    pub fn get(&self, session_id: SessionId) -> Result<Arc<GameSession>, GameError> {
        self.sessions
            .get(&session_id)
            .cloned()
            .ok_or(GameError::SessionNotFound(session_id))
    }

    /// Drops a session (retired or abandoned). Returns it if it was still
    /// registered.
    pub fn remove(&mut self, session_id: SessionId) -> Option<Arc<GameSession>> {
        let removed = self.sessions.remove(&session_id);
        if removed.is_some() {
            tracing::info!(%session_id, live = self.sessions.len(), "session removed");
        }
        removed
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(list: &[&str]) -> Vec<PlayerName> {
        list.iter().map(|n| PlayerName::from(*n)).collect()
    }

    #[test]
    fn test_start_game_creates_once_per_cohort() {
        let mut registry = SessionRegistry::default();

        let (a, _) = registry
            .start_game(&"ann".into(), &cohort(&["ann", "bob", "cat", "dan"]))
            .unwrap();
        let (b, _) = registry
            .start_game(&"cat".into(), &cohort(&["dan", "cat", "bob", "ann"]))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_start_game_roles_match_shared_table() {
        let mut registry = SessionRegistry::default();
        let players = cohort(&["ann", "bob", "cat", "dan"]);

        let mut roles = Vec::new();
        for p in &players {
            let (session, role) = registry.start_game(p, &players).unwrap();
            assert_eq!(session.role_of(p).unwrap(), role);
            roles.push(role);
        }

        roles.sort_by_key(|r| *r as u8);
        assert_eq!(
            roles,
            vec![Role::Mafia, Role::Detective, Role::Civilian, Role::Civilian]
        );
    }

    #[test]
    fn test_start_game_invalid_cohort_creates_nothing() {
        let mut registry = SessionRegistry::default();
        let err = registry
            .start_game(&"ann".into(), &cohort(&["ann", "bob"]))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidCohort(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_unknown_session_is_not_found() {
        let registry = SessionRegistry::default();
        let err = registry.get(SessionId(7)).unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[test]
    fn test_remove_then_get_fails() {
        let mut registry = SessionRegistry::default();
        let (session, _) = registry
            .start_game(&"ann".into(), &cohort(&["ann", "bob", "cat", "dan"]))
            .unwrap();

        assert!(registry.contains(session.id()));
        assert!(registry.remove(session.id()).is_some());
        assert!(registry.remove(session.id()).is_none());
        assert!(registry.get(session.id()).is_err());
    }
}
