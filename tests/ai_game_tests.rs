use armada::{
    Action, AiCommander, Commander, GameConfig, GameEngine, GamePhase, GameResult, PeerMessage, Plan,
    Player, TurnPhase,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Play a whole game between local engines, forwarding every sync message
/// the way the mesh would.
fn play(players: usize, seed: u64, max_turns: Option<u32>) -> Vec<GameEngine> {
    play_with(players, seed, max_turns, GameConfig::default())
}

fn play_with(
    players: usize,
    seed: u64,
    max_turns: Option<u32>,
    config: GameConfig,
) -> Vec<GameEngine> {
    let roster: Vec<Player> = (0..players)
        .map(|i| {
            let id = format!("p{i}");
            if i == 0 {
                Player::host(id.clone(), id)
            } else {
                Player::new(id.clone(), id)
            }
        })
        .collect();
    let mut engines: Vec<GameEngine> = roster
        .iter()
        .map(|p| {
            let mut e = GameEngine::new(p.id.clone(), config.clone());
            e.set_roster(&roster);
            e.set_max_turns(max_turns);
            e
        })
        .collect();
    let mut commanders: Vec<AiCommander> = (0..players).map(|_| AiCommander::new()).collect();
    let mut rng = SmallRng::seed_from_u64(seed);

    let snapshot = engines[0].start_game(&mut rng).unwrap();
    for e in engines.iter_mut().skip(1) {
        e.apply_peer_message("p0", snapshot.clone()).unwrap();
    }

    let broadcast = |engines: &mut Vec<GameEngine>, from: usize, msg: &PeerMessage| {
        let sender = engines[from].local_id().to_string();
        for (i, e) in engines.iter_mut().enumerate() {
            if i != from {
                e.apply_peer_message(&sender, msg.clone()).unwrap();
            }
        }
    };

    for _ in 0..1000 {
        if engines[0].phase() != GamePhase::Playing {
            break;
        }
        let current = engines[0].current_player().unwrap().id.clone();
        let idx = engines.iter().position(|e| e.local_id() == current).unwrap();
        let plan = commanders[idx].plan(&mut rng, &engines[idx]);
        let resolved = match plan {
            Some(Plan::Attack { ship, target }) => {
                let e = &mut engines[idx];
                e.choose_action(TurnPhase::Attack).unwrap();
                e.select_ship(&ship).unwrap();
                Some(e.attack(target).unwrap())
            }
            Some(Plan::Move { ship, to }) => {
                let e = &mut engines[idx];
                e.choose_action(TurnPhase::Movement).unwrap();
                e.select_ship(&ship).unwrap();
                Some(e.move_ship(to).unwrap())
            }
            None => None,
        };
        if let Some(resolved) = resolved {
            broadcast(&mut engines, idx, &resolved.sync);
            if resolved.result.is_some() {
                break;
            }
        }
        let sync = engines[idx].end_turn().unwrap();
        broadcast(&mut engines, idx, &sync);
    }
    engines
}

#[test]
fn test_ai_plans_are_always_legal() {
    for seed in 0..10 {
        let engines = play(3, seed, Some(50));
        assert!(engines.iter().all(|e| e.phase() == GamePhase::GameOver));
    }
}

#[test]
fn test_replicas_agree_on_the_outcome() {
    for players in 2..=5 {
        let engines = play(players, 42, Some(40));
        let result = engines[0].result().cloned();
        assert!(result.is_some());
        for e in &engines[1..] {
            assert_eq!(e.result().cloned(), result);
            assert_eq!(e.board(), engines[0].board());
            assert_eq!(e.history(), engines[0].history());
            assert_eq!(e.turn_count(), engines[0].turn_count());
        }
    }
}

#[test]
fn test_uncapped_game_ends_by_elimination() {
    let config = GameConfig {
        attack_range: None,
        ..GameConfig::default()
    };
    let engines = play_with(2, 3, None, config);
    match engines[0].result() {
        Some(GameResult::LastSurvivor { eliminated, .. }) => assert_eq!(eliminated.len(), 1),
        Some(GameResult::AllEliminated {}) => {}
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_history_is_in_turn_order() {
    let engines = play(2, 5, Some(50));
    let history = engines[0].history();
    assert!(!history.is_empty());
    assert!(history.windows(2).all(|w| w[0].turn() < w[1].turn()));
    assert!(history.iter().all(|a| a.turn() <= engines[0].turn_count()));
}

#[test]
fn test_ai_never_targets_its_own_fleet() {
    // `play` unwraps every attack, so the default range is honoured too.
    let engines = play(4, 17, Some(60));
    let attacks: Vec<_> = engines[0]
        .history()
        .iter()
        .filter_map(|a| match a {
            Action::Attack(record) => Some(record),
            _ => None,
        })
        .collect();
    assert!(!attacks.is_empty());
    for record in attacks {
        assert!(
            !record.affected_players.contains(&record.attacker),
            "{} hit their own fleet",
            record.attacker
        );
    }
}
