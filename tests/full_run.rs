//! A whole run through the controller, recorded in a file-backed ledger

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use flappy_core::game::RankDisplay;
use flappy_core::persistence::DataService;
use flappy_core::sim::{GameEvent, RunPhase};
use flappy_core::{DecodedSprites, Game, ScoreLedger};
use serde_json::json;

const DT: f64 = 16.667;

fn temp_root(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("flappy-core-run-{}-{}", name, uuid::Uuid::new_v4()))
}

fn boot(svc: &DataService, slug: &str) -> Game {
    Game::boot(
        svc.configs(),
        slug,
        None,
        DecodedSprites::default(),
        svc.ledger(),
        "Runner",
        7,
    )
}

/// Flap once and fall; returns the collected events and the end time
fn play(game: &mut Game, mut now: f64) -> (Vec<GameEvent>, f64) {
    let mut events = Vec::new();
    game.flap(false);
    for _ in 0..5000 {
        now += DT;
        events.extend(game.frame(now));
        if game.phase() == RunPhase::Terminated {
            break;
        }
    }
    (events, now)
}

fn settle(game: &mut Game, mut now: f64) {
    for _ in 0..1000 {
        if game.reports_settled() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
        now += DT;
        game.frame(now);
    }
}

#[test]
fn run_is_recorded_and_ranked() {
    let root = temp_root("ranked");
    let svc = DataService::open(&root).unwrap();
    svc.scores().append_raw(&json!({ "player_name": "Pro", "score": 5 })).unwrap();
    svc.configs()
        .set("starter", json!({ "prizes": [{ "min": 0, "max": 1, "name": "Starter" }] }))
        .unwrap();

    let mut game = boot(&svc, "starter");
    let (events, now) = play(&mut game, 0.0);
    assert_eq!(game.phase(), RunPhase::Terminated);
    assert!(events.contains(&GameEvent::RunStarted { run_number: 1 }));
    assert!(events.iter().any(|e| matches!(e, GameEvent::Hit { .. })));
    assert!(events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })));

    settle(&mut game, now);
    let view = game.game_over().cloned().unwrap();
    assert_eq!(view.rank, RankDisplay::Ranked(2));
    assert_eq!(view.rank.to_string(), "Ranking 02");
    assert_eq!(view.prize_group.as_deref(), Some("Starter"));
    assert_eq!(view.submitted, Some(true));

    let rows = svc.scores().read_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].player_name, "Runner");
    assert_eq!(rows[1].prize_group.as_deref(), Some("Starter"));
    assert_eq!(rows[1].meta["version"], json!(1));
    assert_eq!(svc.scores().top(1).unwrap()[0].player_name, "Pro");
    let _ = fs::remove_dir_all(root);
}

#[test]
fn missing_slug_boots_with_defaults_and_reruns() {
    let root = temp_root("rerun");
    let svc = DataService::open(&root).unwrap();
    let mut game = boot(&svc, "never-written");
    assert_eq!(game.config().board.height, 640.0);

    let (_, now) = play(&mut game, 0.0);
    settle(&mut game, now);
    let first_id = game.state().run.run_id.clone();

    let events = game.restart(now + DT);
    assert!(events.contains(&GameEvent::RunStarted { run_number: 2 }));
    assert_ne!(game.state().run.run_id, first_id);
    let (_, now) = play(&mut game, now + DT);
    settle(&mut game, now);
    assert_eq!(game.game_over().map(|v| v.run_number), Some(2));
    assert_eq!(svc.scores().read_all().unwrap().len(), 2);
    let _ = fs::remove_dir_all(root);
}
