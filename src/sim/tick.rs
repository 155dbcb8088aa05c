//! Frame step
//!
//! One call per display refresh. Within a frame the order is fixed:
//! input, background, difficulty, physics, obstacle advance and spawn,
//! collision, then death and score bookkeeping.

use super::background::background_px_per_sec;
use super::collision::body_hits_pair;
use super::difficulty::Difficulty;
use super::physics::{apply_flap, frame_factor, integrate, integrate_fall, update_frame, update_tilt};
use super::spawner::{spawn_interval_ms, spawn_pair};
use super::sprite::Assets;
use super::state::{DeathCause, DeathState, GameEvent, RunEvent, RunPhase, SimulationState};
use crate::consts::{MAX_FRAME_DT_MS, MIN_EXIT_MARGIN};
use crate::settings::Config;

/// Input gathered since the previous frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Jump key/tap pressed
    pub flap: bool,
    /// The press is a key auto-repeat
    pub flap_repeat: bool,
    /// Pause toggle
    pub toggle_pause: bool,
    /// Let the built-in pilot decide when to flap
    pub autopilot: bool,
}

/// Advance the simulation to `now_ms`, `dt_ms` after the previous frame.
///
/// `dt_ms` is capped at [`MAX_FRAME_DT_MS`], whoever the caller is.
pub fn step(
    state: &mut SimulationState,
    cfg: &Config,
    assets: &Assets,
    input: &TickInput,
    now_ms: f64,
    dt_ms: f64,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    state.time_ms = now_ms;
    let dt_ms = dt_ms.min(MAX_FRAME_DT_MS).max(0.0);
    let t = frame_factor(dt_ms);

    if input.toggle_pause && state.phase.is_pausable() {
        state.paused = !state.paused;
        log::info!("Run {} {}", state.run.run_number, if state.paused { "paused" } else { "resumed" });
    }

    let wants_flap = if input.autopilot {
        autopilot_wants_flap(state, cfg)
    } else {
        input.flap && (!input.flap_repeat || cfg.controls.allow_hold_to_flap)
    };
    if wants_flap {
        flap(state, cfg, now_ms, &mut events);
    }

    // Background scrolls while idle and paused, freezes from the hit onward
    let diff = Difficulty::evaluate(cfg, state.active_time_ms, state.run.score);
    state.background.frozen = state.world_frozen();
    state
        .background
        .advance(background_px_per_sec(&cfg.bg, diff.px_per_sec), dt_ms);

    if state.paused && state.phase.is_pausable() {
        return events;
    }

    match state.phase {
        RunPhase::Idle | RunPhase::Terminated => {}
        RunPhase::Dying => step_dying(state, cfg, assets, now_ms, t, &mut events),
        RunPhase::Active => {
            if now_ms >= state.ramp_start_ms {
                state.active_time_ms += dt_ms;
            }
            step_active(state, cfg, assets, now_ms, dt_ms, t, &mut events);
        }
    }
    events
}

/// Handle a flap press. Ignored while paused, dying, terminated or too soon
/// after the previous flap.
pub fn flap(state: &mut SimulationState, cfg: &Config, now_ms: f64, events: &mut Vec<GameEvent>) -> bool {
    if state.paused || state.phase.on(RunEvent::Flap).is_none() {
        return false;
    }
    if !apply_flap(&mut state.body, &cfg.bird, cfg.controls.min_flap_interval_ms, now_ms) {
        return false;
    }
    if state.phase == RunPhase::Idle {
        start_run(state, cfg, now_ms);
        events.push(GameEvent::RunStarted {
            run_number: state.run.run_number,
        });
    }
    state.transition(RunEvent::Flap);
    events.push(GameEvent::Flap);
    true
}

/// Start the next run straight from the game-over screen.
///
/// Replaces the whole state (pairs, death timeline, spawn countdown) and
/// applies the first flap. `None` unless the run has terminated.
pub fn restart(
    state: &mut SimulationState,
    cfg: &Config,
    seed: u64,
    now_ms: f64,
) -> Option<Vec<GameEvent>> {
    state.phase.on(RunEvent::Restart)?;
    let run_number = state.run.run_number + 1;
    *state = SimulationState::new(cfg, seed, run_number);
    state.time_ms = now_ms;
    let mut events = Vec::new();
    flap(state, cfg, now_ms, &mut events);
    Some(events)
}

/// First flap of a run: start the grace period and the first spawn
fn start_run(state: &mut SimulationState, cfg: &Config, now_ms: f64) {
    state.run.start_ms = Some(now_ms);
    state.run.started_at = chrono::Utc::now();
    state.grace_until_ms = now_ms + cfg.gameplay.grace_period_ms.max(0.0);
    state.ramp_start_ms = state.grace_until_ms + cfg.difficulty.time_start_delay_ms.max(0.0);
    log::info!("Run {} started (seed {})", state.run.run_number, state.seed);

    spawn_next(state, cfg);
    let diff = Difficulty::evaluate(cfg, state.active_time_ms, state.run.score);
    state.spawn_countdown_ms = Some(spawn_interval_ms(cfg, diff.px_per_sec));
}

fn spawn_next(state: &mut SimulationState, cfg: &Config) {
    let diff = Difficulty::evaluate(cfg, state.active_time_ms, state.run.score);
    let id = state.next_pair_id();
    let pair = spawn_pair(cfg, id, diff.gap, state.last_center, &mut state.rng);
    state.last_center = Some(pair.gap_center);
    state.pipes.push(pair);
}

fn step_active(
    state: &mut SimulationState,
    cfg: &Config,
    assets: &Assets,
    now_ms: f64,
    dt_ms: f64,
    t: f32,
    events: &mut Vec<GameEvent>,
) {
    let diff = Difficulty::evaluate(cfg, state.active_time_ms, state.run.score);
    state.scroll_speed = diff.speed;

    let in_grace = now_ms < state.grace_until_ms;
    integrate(&mut state.body, cfg.physics.gravity, cfg.bird.max_fall_speed, t, in_grace);
    update_tilt(&mut state.body, &cfg.bird, t);
    update_frame(&mut state.body, &cfg.bird.flap_anim, assets.body_frames.len(), now_ms);

    if state.body.y > cfg.board.height {
        die(state, cfg, DeathCause::FloorFall, now_ms, events);
        return;
    }

    for pair in &mut state.pipes {
        pair.x -= diff.speed * t;
    }
    if let Some(countdown) = state.spawn_countdown_ms.as_mut() {
        *countdown -= dt_ms;
    }
    while state.spawn_countdown_ms.is_some_and(|c| c <= 0.0) {
        spawn_next(state, cfg);
        let interval = spawn_interval_ms(cfg, diff.px_per_sec);
        if let Some(countdown) = state.spawn_countdown_ms.as_mut() {
            *countdown += interval;
        }
    }

    let hit = state
        .pipes
        .iter()
        .any(|pair| body_hits_pair(&cfg.collision, assets, &state.body, pair));
    if hit {
        die(state, cfg, DeathCause::Collision, now_ms, events);
        return;
    }

    let increment = cfg.scoring.increment();
    let body_x = state.body.x;
    for pair in &mut state.pipes {
        if !pair.passed && body_x > pair.right() {
            pair.passed = true;
            state.run.score += increment;
            events.push(GameEvent::Score {
                total: state.run.score,
            });
        }
    }
    state.pipes.retain(|p| !p.is_off_screen());
}

fn die(
    state: &mut SimulationState,
    cfg: &Config,
    cause: DeathCause,
    now_ms: f64,
    events: &mut Vec<GameEvent>,
) {
    let event = match cause {
        DeathCause::Collision => RunEvent::Collision,
        DeathCause::FloorFall => RunEvent::FloorFall,
    };
    if !state.transition(event) {
        return;
    }
    state.death = Some(DeathState::start(cfg, &state.body, cause, now_ms));
    state.body.vy = 0.0;
    state.background.frozen = true;
    state.spawn_countdown_ms = None;
    log::info!(
        "Run {} hit ({:?}) at score {}",
        state.run.run_number,
        cause,
        crate::format_score(state.run.score)
    );
    events.push(GameEvent::Hit { cause });
}

fn step_dying(
    state: &mut SimulationState,
    cfg: &Config,
    assets: &Assets,
    now_ms: f64,
    t: f32,
    events: &mut Vec<GameEvent>,
) {
    let Some(death) = state.death else {
        return;
    };
    if death.is_frozen(now_ms) {
        state.body.y = death.hold_y;
        state.body.tilt_deg = death.hold_tilt;
    } else {
        integrate_fall(&mut state.body, cfg.death_fall_gravity(), cfg.death_max_fall_speed(), t);
        update_tilt(&mut state.body, &cfg.bird, t);
    }
    update_frame(&mut state.body, &cfg.bird.flap_anim, assets.body_frames.len(), now_ms);

    let exit_y = cfg.board.height + MIN_EXIT_MARGIN.max(state.body.h);
    if state.body.y > exit_y && state.transition(RunEvent::ExitScreen) {
        state.run.end_ms = Some(now_ms);
        log::info!(
            "Run {} over, score {}",
            state.run.run_number,
            crate::format_score(state.run.score)
        );
        events.push(GameEvent::GameOver {
            score: state.run.score,
        });
    }
}

/// Simple pilot: aim for the gap of the next pair ahead
pub fn autopilot_wants_flap(state: &SimulationState, cfg: &Config) -> bool {
    match state.phase {
        RunPhase::Idle => return true,
        RunPhase::Active => {}
        _ => return false,
    }
    let body = &state.body;
    let target = state
        .pipes
        .iter()
        .find(|p| p.right() >= body.x)
        .map(|p| p.gap_center + p.gap / 4.0)
        .unwrap_or(cfg.board.height / 2.0);
    body.y + body.h / 2.0 > target && body.vy >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::ObstaclePair;

    const DT: f64 = 16.667;

    fn setup() -> (Config, Assets, SimulationState) {
        let cfg = Config::default();
        let state = SimulationState::new(&cfg, 12345, 1);
        (cfg, Assets::default(), state)
    }

    fn press() -> TickInput {
        TickInput {
            flap: true,
            ..Default::default()
        }
    }

    fn wide_open_pair(state: &SimulationState, x: f32) -> ObstaclePair {
        let y = state.body.y;
        ObstaclePair {
            id: 99,
            x,
            width: 64.0,
            height: 512.0,
            top_y: y - 200.0 - 512.0,
            bottom_y: y + 200.0,
            gap_center: y,
            gap: 400.0,
            passed: false,
        }
    }

    #[test]
    fn test_idle_until_first_flap() {
        let (cfg, assets, mut state) = setup();
        let y0 = state.body.y;
        for i in 0..30 {
            step(&mut state, &cfg, &assets, &TickInput::default(), i as f64 * DT, DT);
        }
        assert_eq!(state.phase, RunPhase::Idle);
        assert!(state.pipes.is_empty());
        assert_eq!(state.body.y, y0);
        assert!(state.spawn_countdown_ms.is_none());
        // Background is passive while idle
        assert!(state.background.scroll_x > 0.0);
    }

    #[test]
    fn test_first_flap_spawns_immediately() {
        let (cfg, assets, mut state) = setup();
        let events = step(&mut state, &cfg, &assets, &press(), 1000.0, DT);
        assert_eq!(state.phase, RunPhase::Active);
        assert_eq!(state.pipes.len(), 1);
        assert!(state.pipes[0].x <= cfg.board.width);
        assert_eq!(state.run.start_ms, Some(1000.0));
        assert!(events.contains(&GameEvent::Flap));
        assert!(events.contains(&GameEvent::RunStarted { run_number: 1 }));
    }

    #[test]
    fn test_spawn_countdown_follows_speed() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.pipes.clear();
        // First interval at 120 px/s is 1440 ms; keep the body airborne
        let mut now = 0.0;
        let mut flap_at = 0.0;
        while now < 1400.0 {
            now += DT;
            let input = if now - flap_at > 300.0 {
                flap_at = now;
                press()
            } else {
                TickInput::default()
            };
            step(&mut state, &cfg, &assets, &input, now, DT);
        }
        assert!(state.pipes.is_empty());
        for _ in 0..5 {
            now += DT;
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
        }
        assert_eq!(state.pipes.len(), 1);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.pipes = vec![wide_open_pair(&state, -30.0)];
        let events = step(&mut state, &cfg, &assets, &TickInput::default(), DT, DT);
        assert_eq!(state.run.score, 1.0);
        assert!(events.contains(&GameEvent::Score { total: 1.0 }));
        for i in 2..6 {
            step(&mut state, &cfg, &assets, &TickInput::default(), i as f64 * DT, DT);
        }
        assert_eq!(state.run.score, 1.0);
    }

    #[test]
    fn test_points_per_obstacle() {
        let (mut cfg, assets, mut state) = setup();
        cfg.scoring.points_per_obstacle = Some(0.25);
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.pipes = vec![wide_open_pair(&state, -30.0), wide_open_pair(&state, -20.0)];
        step(&mut state, &cfg, &assets, &TickInput::default(), DT, DT);
        assert_eq!(state.run.score, 0.5);
    }

    #[test]
    fn test_death_hold_lasts_exactly_freeze_ms() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        let x = state.body.x;
        let mut pair = wide_open_pair(&state, x);
        pair.bottom_y = state.body.y + 2.0;
        state.pipes = vec![pair];

        let hit_at = 100.0;
        let events = step(&mut state, &cfg, &assets, &TickInput::default(), hit_at, DT);
        assert_eq!(state.phase, RunPhase::Dying);
        assert!(events.contains(&GameEvent::Hit {
            cause: DeathCause::Collision
        }));
        let hold_y = state.body.y;
        let pipes_x = state.pipes[0].x;
        let scroll = state.background.scroll_x;

        let mut now = hit_at;
        while now + DT < hit_at + cfg.death.freeze_ms {
            now += DT;
            step(&mut state, &cfg, &assets, &press(), now, DT);
            assert_eq!(state.body.y, hold_y);
            assert_eq!(state.phase, RunPhase::Dying);
        }
        // World is frozen and flaps are ignored
        assert_eq!(state.pipes[0].x, pipes_x);
        assert_eq!(state.background.scroll_x, scroll);

        step(&mut state, &cfg, &assets, &TickInput::default(), hit_at + cfg.death.freeze_ms, DT);
        assert!(state.body.y > hold_y);
    }

    #[test]
    fn test_floor_fall_then_game_over() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.pipes.clear();
        state.spawn_countdown_ms = Some(f64::INFINITY);

        let mut now = 0.0;
        let mut saw_hit = false;
        let mut saw_over = false;
        for _ in 0..2000 {
            now += DT;
            for event in step(&mut state, &cfg, &assets, &TickInput::default(), now, DT) {
                match event {
                    GameEvent::Hit { cause } => {
                        assert_eq!(cause, DeathCause::FloorFall);
                        saw_hit = true;
                    }
                    GameEvent::GameOver { score } => {
                        assert_eq!(score, 0.0);
                        saw_over = true;
                    }
                    _ => {}
                }
            }
            if state.phase == RunPhase::Terminated {
                break;
            }
        }
        assert!(saw_hit && saw_over);
        assert!(state.body.y > cfg.board.height + 24.0);
        assert!(state.run.end_ms.is_some());
    }

    #[test]
    fn test_weightless_config_still_ends_the_run() {
        let cfg = Config::from_overrides(&serde_json::json!({ "physics": { "gravity": 0.0 } }));
        let assets = Assets::default();
        let mut state = SimulationState::new(&cfg, 12345, 1);
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        let x = state.body.x;
        let mut pair = wide_open_pair(&state, x);
        pair.bottom_y = state.body.y + 2.0;
        state.pipes = vec![pair];

        let mut now = 0.0;
        for _ in 0..20_000 {
            now += DT;
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
            if state.phase == RunPhase::Terminated {
                break;
            }
        }
        assert_eq!(state.phase, RunPhase::Terminated);
        assert!(state.run.end_ms.is_some());
    }

    #[test]
    fn test_time_ramp_waits_for_start_delay() {
        let (mut cfg, assets, mut state) = setup();
        cfg.difficulty.time_start_delay_ms = 5000.0;
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.spawn_countdown_ms = Some(f64::INFINITY);
        let base = Difficulty::evaluate(&cfg, 0.0, 0.0);

        let hold = |state: &mut SimulationState| {
            state.pipes.clear();
            state.body.y = cfg.board.height / 2.0;
            state.body.vy = 0.0;
        };
        let mut now = 0.0;
        while now + DT < 5000.0 {
            now += DT;
            hold(&mut state);
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
        }
        assert_eq!(state.phase, RunPhase::Active);
        assert_eq!(state.active_time_ms, 0.0);
        assert_eq!(state.scroll_speed, base.speed);
        let diff = Difficulty::evaluate(&cfg, state.active_time_ms, state.run.score);
        assert_eq!(diff.gap_percent, base.gap_percent);

        for _ in 0..120 {
            now += DT;
            hold(&mut state);
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
        }
        assert!(state.active_time_ms > 1000.0);
        assert!(state.scroll_speed > base.speed);
        let diff = Difficulty::evaluate(&cfg, state.active_time_ms, state.run.score);
        assert!(diff.gap_percent < base.gap_percent);
    }

    #[test]
    fn test_flap_inside_min_interval_is_dropped() {
        let (cfg, assets, mut state) = setup();
        assert_eq!(cfg.controls.min_flap_interval_ms, 120.0);
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);

        let events = step(&mut state, &cfg, &assets, &press(), 100.0, DT);
        assert!(!events.contains(&GameEvent::Flap));
        assert_eq!(state.body.last_flap_ms, Some(0.0));
        // Dropped, not queued
        let events = step(&mut state, &cfg, &assets, &TickInput::default(), 130.0, DT);
        assert!(!events.contains(&GameEvent::Flap));

        let events = step(&mut state, &cfg, &assets, &press(), 140.0, DT);
        assert!(events.contains(&GameEvent::Flap));
        assert!(state.body.vy < 0.0);
        assert_eq!(state.body.last_flap_ms, Some(140.0));
    }

    #[test]
    fn test_grace_period_has_no_descent() {
        let (mut cfg, assets, mut state) = setup();
        cfg.gameplay.grace_period_ms = 1500.0;
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.spawn_countdown_ms = Some(f64::INFINITY);

        let mut now = 0.0;
        let mut last_y = state.body.y;
        while now + DT < 1500.0 {
            now += DT;
            state.pipes.clear();
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
            assert!(state.body.vy <= 0.0);
            assert!(state.body.y <= last_y);
            last_y = state.body.y;
        }
        assert_eq!(state.phase, RunPhase::Active);

        for _ in 0..30 {
            now += DT;
            step(&mut state, &cfg, &assets, &TickInput::default(), now, DT);
        }
        assert!(state.body.y > last_y);
    }

    #[test]
    fn test_huge_delta_is_capped() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        assert_eq!(state.pipes.len(), 1);
        let y = state.body.y;
        let active = state.active_time_ms;
        step(&mut state, &cfg, &assets, &TickInput::default(), 60_000.0, 60_000.0);
        assert_eq!(state.pipes.len(), 1);
        assert_eq!(state.active_time_ms - active, crate::consts::MAX_FRAME_DT_MS);
        assert!((state.body.y - y).abs() < 50.0);
    }

    #[test]
    fn test_pause_halts_simulation_but_not_death() {
        let (cfg, assets, mut state) = setup();
        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        let toggle = TickInput {
            toggle_pause: true,
            ..Default::default()
        };
        step(&mut state, &cfg, &assets, &toggle, DT, DT);
        assert!(state.paused);
        let y = state.body.y;
        let active = state.active_time_ms;
        let pipes = state.pipes.clone();
        for i in 2..20 {
            step(&mut state, &cfg, &assets, &press(), i as f64 * DT, DT);
        }
        assert_eq!(state.body.y, y);
        assert_eq!(state.active_time_ms, active);
        assert_eq!(state.pipes, pipes);

        step(&mut state, &cfg, &assets, &toggle, 20.0 * DT, DT);
        assert!(!state.paused);

        // Once dying, pause requests are ignored
        state.body.y = cfg.board.height + 1.0;
        step(&mut state, &cfg, &assets, &TickInput::default(), 21.0 * DT, DT);
        assert_eq!(state.phase, RunPhase::Dying);
        step(&mut state, &cfg, &assets, &toggle, 22.0 * DT, DT);
        assert!(!state.paused);
    }

    #[test]
    fn test_restart_only_from_terminated() {
        let (cfg, assets, mut state) = setup();
        assert!(restart(&mut state, &cfg, 2, 0.0).is_none());

        step(&mut state, &cfg, &assets, &press(), 0.0, DT);
        state.pipes = vec![wide_open_pair(&state, -30.0)];
        state.phase = RunPhase::Terminated;
        let events = restart(&mut state, &cfg, 2, 5000.0).unwrap_or_default();
        assert_eq!(state.phase, RunPhase::Active);
        assert_eq!(state.run.run_number, 2);
        assert_eq!(state.run.score, 0.0);
        assert!(state.death.is_none());
        // Old pairs are gone; the new run spawned its first pair
        assert_eq!(state.pipes.len(), 1);
        assert!(events.contains(&GameEvent::Flap));
    }

    #[test]
    fn test_hold_repeat_is_filtered() {
        let (mut cfg, assets, mut state) = setup();
        let repeat = TickInput {
            flap: true,
            flap_repeat: true,
            ..Default::default()
        };
        step(&mut state, &cfg, &assets, &repeat, 0.0, DT);
        assert_eq!(state.phase, RunPhase::Idle);
        cfg.controls.allow_hold_to_flap = true;
        step(&mut state, &cfg, &assets, &repeat, DT, DT);
        assert_eq!(state.phase, RunPhase::Active);
    }

    #[test]
    fn test_speed_never_drops_within_a_run() {
        let (mut cfg, assets, mut state) = setup();
        cfg.difficulty.ramp_enabled = true;
        let autopilot = TickInput {
            autopilot: true,
            ..Default::default()
        };
        let mut last = 0.0f32;
        let mut now = 0.0;
        for _ in 0..5000 {
            now += DT;
            step(&mut state, &cfg, &assets, &autopilot, now, DT);
            assert!(state.scroll_speed >= last);
            last = state.scroll_speed;
            if state.phase == RunPhase::Terminated {
                break;
            }
        }
    }
}
