//! Full rounds played by four concurrent tasks against one session.

use std::sync::Arc;
use std::time::Duration;

use nightfall_game::{
    GameConfig, GameError, GameSession, NightOutcome, SessionRegistry,
    SessionStatus,
};
use nightfall_protocol::{Faction, PlayerName, Role};
use tokio::task::JoinHandle;

fn cohort() -> Vec<PlayerName> {
    vec!["ann".into(), "bob".into(), "cat".into(), "dan".into()]
}

fn start(config: GameConfig) -> (SessionRegistry, Arc<GameSession>) {
    let mut registry = SessionRegistry::new(config);
    let players = cohort();
    let (session, _) = registry.start_game(&players[0], &players).unwrap();
    (registry, session)
}

struct Cast {
    mafia: PlayerName,
    detective: PlayerName,
    civilians: [PlayerName; 2],
}

fn cast(session: &GameSession) -> Cast {
    let by_role = |role: Role| -> Vec<PlayerName> {
        session
            .players()
            .iter()
            .zip(session.roles())
            .filter(|(_, r)| **r == role)
            .map(|(p, _)| p.clone())
            .collect()
    };
    let civilians = by_role(Role::Civilian);
    Cast {
        mafia: by_role(Role::Mafia).remove(0),
        detective: by_role(Role::Detective).remove(0),
        civilians: [civilians[0].clone(), civilians[1].clone()],
    }
}

fn spawn_night(
    session: &Arc<GameSession>,
    player: &PlayerName,
) -> JoinHandle<Result<NightOutcome, GameError>> {
    let session = Arc::clone(session);
    let player = player.clone();
    tokio::spawn(async move { session.wait_night(&player).await })
}

fn spawn_vote(
    session: &Arc<GameSession>,
    player: &PlayerName,
    ballot: Option<&PlayerName>,
) -> JoinHandle<Result<Option<PlayerName>, GameError>> {
    let session = Arc::clone(session);
    let player = player.clone();
    let ballot = ballot.cloned();
    tokio::spawn(async move { session.vote(&player, ballot.as_ref()).await })
}

async fn night(session: &Arc<GameSession>) -> Vec<NightOutcome> {
    let handles: Vec<_> = session
        .players()
        .iter()
        .map(|p| spawn_night(session, p))
        .collect();

    let mut outcomes = Vec::new();
    for h in handles {
        outcomes.push(h.await.unwrap().unwrap());
    }
    outcomes
}

async fn vote(
    session: &Arc<GameSession>,
    ballots: &[(&PlayerName, Option<&PlayerName>)],
) -> Vec<Option<PlayerName>> {
    let handles: Vec<_> = ballots
        .iter()
        .map(|(p, b)| spawn_vote(session, p, *b))
        .collect();

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }
    results
}

// =========================================================================
// Barriers
// =========================================================================

#[tokio::test]
async fn test_wait_night_holds_until_fourth_caller() {
    let (_registry, session) = start(GameConfig::default());
    let players = session.players().clone();

    let early: Vec<_> = players[..3]
        .iter()
        .map(|p| spawn_night(&session, p))
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(early.iter().all(|h| !h.is_finished()));

    let last = spawn_night(&session, &players[3]);
    for h in early {
        h.await.unwrap().unwrap();
    }
    last.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_vote_holds_until_fourth_ballot() {
    let (_registry, session) = start(GameConfig::default());
    let players = session.players().clone();

    let early: Vec<_> = players[..3]
        .iter()
        .map(|p| spawn_vote(&session, p, None))
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(early.iter().all(|h| !h.is_finished()));

    let last = spawn_vote(&session, &players[3], None);
    for h in early {
        assert_eq!(h.await.unwrap().unwrap(), None);
    }
    assert_eq!(last.await.unwrap().unwrap(), None);
}

// =========================================================================
// Full games
// =========================================================================

#[tokio::test]
async fn test_civilians_win_by_voting_out_mafia() {
    let (mut registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        detective,
        civilians: [victim, survivor],
    } = cast(&session);

    // Night 1: the Mafia kills a civilian, the Detective finds the Mafia.
    assert!(session.query_day_action(&mafia).unwrap());
    assert!(session.inspect(&detective, &mafia).await.unwrap());
    session.designate_kill(&mafia, &victim).await.unwrap();

    for outcome in night(&session).await {
        assert_eq!(outcome.killed.as_ref(), Some(&victim));
        assert_eq!(outcome.revealed_mafia, None);
    }

    assert_eq!(session.check_winner(&survivor).await.unwrap(), None);
    let alive = session.query_alive(&survivor).await.unwrap();
    assert_eq!(alive.len(), 3);
    assert!(!alive.contains(&victim));

    // Day 1: everyone alive votes the Mafia out; the dead abstain.
    let executed = vote(
        &session,
        &[
            (&mafia, Some(&detective)),
            (&detective, Some(&mafia)),
            (&survivor, Some(&mafia)),
            (&victim, None),
        ],
    )
    .await;
    assert!(executed.iter().all(|e| e.as_ref() == Some(&mafia)));

    assert_eq!(
        session.check_winner(&victim).await.unwrap(),
        Some(Faction::Civilians)
    );

    // Terminal reads: only the 4th retires.
    for (i, p) in session.players().clone().iter().enumerate() {
        let read = session.read_roles(p).await.unwrap();
        assert_eq!(read.retire, i == 3);
        if read.retire {
            registry.remove(session.id());
        }
    }
    assert_eq!(session.status().await, SessionStatus::Retired);
    assert!(registry.is_empty());

    let result = session.outcome().await;
    assert_eq!(result.winner, Some(Faction::Civilians));
    assert_eq!(result.nights, 1);
    let mafia_row = result.players.iter().find(|p| p.name == mafia).unwrap();
    assert!(!mafia_row.won);
    assert_eq!(result.players.iter().filter(|p| p.won).count(), 3);
}

#[tokio::test]
async fn test_mafia_wins_after_two_kills() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        detective,
        civilians: [first, second],
    } = cast(&session);

    session.designate_kill(&mafia, &first).await.unwrap();
    night(&session).await;

    // A tied vote executes nobody.
    let executed = vote(
        &session,
        &[
            (&mafia, Some(&detective)),
            (&detective, Some(&mafia)),
            (&second, None),
            (&first, None),
        ],
    )
    .await;
    assert!(executed.iter().all(Option::is_none));
    assert_eq!(session.check_winner(&mafia).await.unwrap(), None);

    session.designate_kill(&mafia, &second).await.unwrap();
    for outcome in night(&session).await {
        assert_eq!(outcome.killed.as_ref(), Some(&second));
    }

    assert_eq!(
        session.check_winner(&detective).await.unwrap(),
        Some(Faction::Mafia)
    );
}

#[tokio::test]
async fn test_last_designation_wins() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        civilians: [first, second],
        ..
    } = cast(&session);

    session.designate_kill(&mafia, &first).await.unwrap();
    session.designate_kill(&mafia, &second).await.unwrap();

    for outcome in night(&session).await {
        assert_eq!(outcome.killed.as_ref(), Some(&second));
    }
    assert!(session.query_alive(&mafia).await.unwrap().contains(&first));
}

#[tokio::test]
async fn test_reveal_lasts_one_night() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia, detective, ..
    } = cast(&session);

    session.reveal_mafia(&detective).await.unwrap();
    for outcome in night(&session).await {
        assert_eq!(outcome.revealed_mafia.as_ref(), Some(&mafia));
        assert_eq!(outcome.killed, None);
    }

    let abstain: Vec<(&PlayerName, Option<&PlayerName>)> =
        session.players().iter().map(|p| (p, None)).collect();
    vote(&session, &abstain).await;

    for outcome in night(&session).await {
        assert_eq!(outcome.revealed_mafia, None);
    }
}

#[tokio::test]
async fn test_query_alive_is_stable_between_rounds() {
    let (_registry, session) = start(GameConfig::default());
    let first = session.query_alive(&"ann".into()).await.unwrap();
    let second = session.query_alive(&"dan".into()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_eliminated_detective_still_has_day_action() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia, detective, ..
    } = cast(&session);

    session.designate_kill(&mafia, &detective).await.unwrap();
    night(&session).await;
    assert!(!session.query_alive(&mafia).await.unwrap().contains(&detective));

    // The role table answers; the night action itself is what's refused.
    assert!(session.query_day_action(&detective).unwrap());
    let err = session.reveal_mafia(&detective).await.unwrap_err();
    assert!(matches!(err, GameError::InvariantViolation { .. }));
}

// =========================================================================
// Violations
// =========================================================================

#[tokio::test]
async fn test_illegal_ballot_releases_waiting_voters() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        detective,
        civilians: [victim, survivor],
    } = cast(&session);

    session.designate_kill(&mafia, &victim).await.unwrap();
    night(&session).await;

    let waiting = vec![
        spawn_vote(&session, &mafia, None),
        spawn_vote(&session, &detective, None),
        spawn_vote(&session, &survivor, None),
    ];
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = session.vote(&victim, Some(&detective)).await.unwrap_err();
    assert!(matches!(err, GameError::InvariantViolation { .. }));
    assert!(err.is_fatal());

    for h in waiting {
        let released = tokio::time::timeout(Duration::from_secs(1), h)
            .await
            .expect("voter should be released")
            .unwrap();
        assert!(matches!(released, Err(GameError::SessionAbandoned(_))));
    }
    assert_eq!(session.status().await, SessionStatus::Abandoned);
}

#[tokio::test]
async fn test_ballot_for_eliminated_player_is_rejected() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        detective,
        civilians: [victim, _],
    } = cast(&session);

    session.designate_kill(&mafia, &victim).await.unwrap();
    night(&session).await;

    let err = session.vote(&detective, Some(&victim)).await.unwrap_err();
    assert_eq!(err.code(), 409);

    // Nothing more happens in an abandoned session.
    let err = session.inspect(&detective, &mafia).await.unwrap_err();
    assert_eq!(err.code(), 410);
}

#[tokio::test]
async fn test_duplicate_ballot_abandons_session() {
    let (_registry, session) = start(GameConfig::default());
    let Cast {
        mafia,
        civilians: [a, b],
        ..
    } = cast(&session);

    let first = spawn_vote(&session, &a, Some(&mafia));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = session.vote(&a, Some(&mafia)).await.unwrap_err();
    assert!(matches!(err, GameError::InvariantViolation { .. }));

    let first = first.await.unwrap().unwrap_err();
    assert!(matches!(first, GameError::SessionAbandoned(_)));

    let err = session.vote(&b, None).await.unwrap_err();
    assert!(matches!(err, GameError::SessionAbandoned(_)));
}

// =========================================================================
// Round timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_round_timeout_abandons_session() {
    let (mut registry, session) =
        start(GameConfig::with_round_timeout(Duration::from_secs(5)));
    let players = session.players().clone();

    let first = spawn_night(&session, &players[0]);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let others: Vec<_> = players[1..3]
        .iter()
        .map(|p| spawn_night(&session, p))
        .collect();

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, GameError::RoundTimeout { gate: "night", .. }));
    assert!(err.is_fatal());

    for h in others {
        let err = h.await.unwrap().unwrap_err();
        assert!(matches!(err, GameError::SessionAbandoned(_)));
    }

    assert_eq!(session.status().await, SessionStatus::Abandoned);
    let err = session.query_alive(&players[3]).await.unwrap_err();
    assert_eq!(err.code(), 410);

    registry.remove(session.id());
    assert!(registry.get(session.id()).is_err());
}
