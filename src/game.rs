//! Game controller
//!
//! Owns the configuration, assets, simulation state and the score ledger.
//! The host calls [`Game::frame`] once per display refresh and forwards
//! input through [`Game::flap`] and the pause methods.
//!
//! At the end of a run the score submission and the rank query run on two
//! worker threads. Neither blocks the frame loop: the game-over view is
//! available immediately and its rank is filled in once, when the rank
//! worker reports back.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::highscores::{
    BoardSize, LeaderboardEntry, RUN_META_VERSION, RunMeta, ScoreLedger, ScoreRecord,
    prize_group_for,
};
use crate::platform::FrameClock;
use crate::render::{Scene, build_scene};
use crate::settings::{Config, ConfigSource};
use crate::sim::{Assets, GameEvent, RunEvent, RunPhase, SimulationState, Sprite, TickInput, restart, step};

/// Decoded sprites handed over by the host; `None` entries failed to load
#[derive(Debug, Clone, Default)]
pub struct DecodedSprites {
    pub body_frames: Vec<Option<Sprite>>,
    pub top_pipe: Option<Sprite>,
    pub bottom_pipe: Option<Sprite>,
    pub background: Option<Sprite>,
}

/// Rank shown on the game-over screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDisplay {
    /// Rank query still running
    Pending,
    Ranked(usize),
    /// Rank query failed
    Unavailable,
}

impl fmt::Display for RankDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankDisplay::Ranked(rank) => write!(f, "Ranking {:02}", rank),
            RankDisplay::Pending | RankDisplay::Unavailable => write!(f, "Ranking --"),
        }
    }
}

/// What the game-over screen shows
#[derive(Debug, Clone, PartialEq)]
pub struct GameOverView {
    pub run_number: u64,
    pub score: f64,
    pub score_text: String,
    pub prize_group: Option<String>,
    pub rank: RankDisplay,
    /// `None` until the submission worker reports
    pub submitted: Option<bool>,
}

enum WorkerReport {
    Submitted { run: u64, ok: bool },
    Ranked { run: u64, rank: Option<usize> },
}

pub struct Game {
    cfg: Config,
    assets: Assets,
    state: SimulationState,
    clock: FrameClock,
    ledger: Arc<dyn ScoreLedger>,
    player_name: String,
    seed: u64,
    input: TickInput,
    game_over: Option<GameOverView>,
    reports_tx: Sender<WorkerReport>,
    reports_rx: Receiver<WorkerReport>,
}

impl Game {
    pub fn new(
        cfg: Config,
        assets: Assets,
        ledger: Arc<dyn ScoreLedger>,
        player_name: &str,
        seed: u64,
    ) -> Self {
        let state = SimulationState::new(&cfg, run_seed(seed, 1), 1);
        let (reports_tx, reports_rx) = mpsc::channel();
        Self {
            cfg,
            assets,
            state,
            clock: FrameClock::default(),
            ledger,
            player_name: player_name.to_string(),
            seed,
            input: TickInput::default(),
            game_over: None,
            reports_tx,
            reports_rx,
        }
    }

    /// Fetch tuning for `slug` (defaults on failure), fit it to the board,
    /// resize a too-small body and build the assets. Completes before the
    /// first frame.
    pub fn boot(
        source: &dyn ConfigSource,
        slug: &str,
        board: Option<(f32, f32)>,
        sprites: DecodedSprites,
        ledger: Arc<dyn ScoreLedger>,
        player_name: &str,
        seed: u64,
    ) -> Self {
        let mut cfg = Config::load(source, slug);
        if let Some((w, h)) = board {
            cfg = cfg.fit_board(w, h);
        }
        let aspect = sprites
            .body_frames
            .iter()
            .flatten()
            .find(|s| s.height() > 0)
            .map(|s| s.width() as f32 / s.height() as f32);
        cfg = cfg.autosize_bird(aspect);
        let assets = Assets::build(
            &cfg,
            sprites.body_frames,
            sprites.top_pipe,
            sprites.bottom_pipe,
            sprites.background,
        );
        log::info!(
            "Booted with slug {:?}: board {}x{}, scale {:.3}",
            slug,
            cfg.board.width,
            cfg.board.height,
            cfg.scale
        );
        Self::new(cfg, assets, ledger, player_name, seed)
    }

    /// Queue a flap for the next frame
    pub fn flap(&mut self, repeat: bool) {
        self.input.flap = true;
        self.input.flap_repeat = repeat;
    }

    pub fn toggle_pause(&mut self) {
        self.input.toggle_pause = !self.input.toggle_pause;
    }

    /// Pause or resume immediately (focus loss, visibility change)
    pub fn set_paused(&mut self, paused: bool) {
        if self.state.phase.is_pausable() && self.state.paused != paused {
            self.state.paused = paused;
            log::info!("Run {} {}", self.state.run.run_number, if paused { "paused" } else { "resumed" });
        }
    }

    pub fn set_autopilot(&mut self, on: bool) {
        self.input.autopilot = on;
    }

    /// Advance one frame at host timestamp `now_ms`
    pub fn frame(&mut self, now_ms: f64) -> Vec<GameEvent> {
        let dt = self.clock.advance(now_ms);
        let autopilot = self.input.autopilot;
        let mut input = std::mem::take(&mut self.input);
        self.input.autopilot = autopilot;

        let mut events = Vec::new();
        if input.flap && self.state.phase == RunPhase::Terminated && self.cfg.gameplay.restart_on_jump {
            events.extend(self.restart(now_ms));
            input.flap = false;
        }

        events.extend(step(&mut self.state, &self.cfg, &self.assets, &input, now_ms, dt));
        if events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })) {
            self.finish_run();
        }
        self.poll_reports();
        events
    }

    /// Start a fresh run from the game-over screen; no-op otherwise
    pub fn restart(&mut self, now_ms: f64) -> Vec<GameEvent> {
        let next = self.state.run.run_number + 1;
        match restart(&mut self.state, &self.cfg, run_seed(self.seed, next), now_ms) {
            Some(events) => {
                self.game_over = None;
                self.clock.reset();
                self.clock.advance(now_ms);
                events
            }
            None => Vec::new(),
        }
    }

    /// Back to the start screen
    pub fn reset(&mut self) {
        if self.state.phase.on(RunEvent::Reset).is_none() {
            return;
        }
        let next = self.state.run.run_number + 1;
        self.state = SimulationState::new(&self.cfg, run_seed(self.seed, next), next);
        self.game_over = None;
        self.input = TickInput {
            autopilot: self.input.autopilot,
            ..Default::default()
        };
        self.clock.reset();
    }

    pub fn scene(&self, now_ms: f64) -> Scene {
        build_scene(&self.state, &self.cfg, &self.assets, now_ms)
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase
    }

    pub fn game_over(&self) -> Option<&GameOverView> {
        self.game_over.as_ref()
    }

    pub fn leaderboard(&self, n: usize) -> Result<Vec<LeaderboardEntry>> {
        self.ledger.top(n)
    }

    /// Record for the run that just ended
    pub fn score_record(&self) -> ScoreRecord {
        let run = &self.state.run;
        let meta = RunMeta {
            started_at: run.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms: run.duration_ms().round() as u64,
            active_time_ms: self.state.active_time_ms.max(0.0).round() as u64,
            board: BoardSize {
                w: self.cfg.board.width,
                h: self.cfg.board.height,
            },
            version: RUN_META_VERSION,
        };
        ScoreRecord {
            run_id: run.run_id.clone(),
            player_name: self.player_name.clone(),
            score: run.score,
            played_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            prize_group: prize_group_for(&self.cfg.prizes, run.score).map(|g| g.name.clone()),
            meta: serde_json::to_value(meta).unwrap_or(Value::Null),
        }
    }

    fn finish_run(&mut self) {
        let record = self.score_record();
        let run = self.state.run.run_number;
        self.game_over = Some(GameOverView {
            run_number: run,
            score: record.score,
            score_text: crate::format_score(record.score),
            prize_group: record.prize_group.clone(),
            rank: RankDisplay::Pending,
            submitted: None,
        });

        let score = record.score;
        let ledger = Arc::clone(&self.ledger);
        let tx = self.reports_tx.clone();
        let submit = thread::Builder::new()
            .name("score-submit".to_string())
            .spawn(move || {
                let ok = match ledger.append(&record) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("Score submission for run {} failed: {}", run, e);
                        false
                    }
                };
                let _ = tx.send(WorkerReport::Submitted { run, ok });
            });
        if let Err(e) = submit {
            log::warn!("Could not start score submission: {}", e);
            let _ = self.reports_tx.send(WorkerReport::Submitted { run, ok: false });
        }

        let ledger = Arc::clone(&self.ledger);
        let tx = self.reports_tx.clone();
        let rank = thread::Builder::new()
            .name("score-rank".to_string())
            .spawn(move || {
                let rank = match ledger.rank_for(score) {
                    Ok(rank) => Some(rank),
                    Err(e) => {
                        log::warn!("Rank query for run {} failed: {}", run, e);
                        None
                    }
                };
                let _ = tx.send(WorkerReport::Ranked { run, rank });
            });
        if let Err(e) = rank {
            log::warn!("Could not start rank query: {}", e);
            let _ = self.reports_tx.send(WorkerReport::Ranked { run, rank: None });
        }
    }

    /// Apply finished worker reports; reports for older runs are dropped
    pub fn poll_reports(&mut self) {
        loop {
            let report = match self.reports_rx.try_recv() {
                Ok(report) => report,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let Some(view) = self.game_over.as_mut() else {
                continue;
            };
            match report {
                WorkerReport::Submitted { run, ok } if run == view.run_number => {
                    view.submitted = Some(ok);
                }
                WorkerReport::Ranked { run, rank } if run == view.run_number => {
                    if view.rank == RankDisplay::Pending {
                        view.rank = rank.map_or(RankDisplay::Unavailable, RankDisplay::Ranked);
                        log::info!("Run {} {}", run, view.rank);
                    }
                }
                _ => log::debug!("Dropping worker report for an older run"),
            }
        }
    }

    /// True once both end-of-run workers have reported
    pub fn reports_settled(&self) -> bool {
        self.game_over
            .as_ref()
            .is_some_and(|v| v.rank != RankDisplay::Pending && v.submitted.is_some())
    }
}

/// Per-run RNG seed derived from the session seed
fn run_seed(seed: u64, run_number: u64) -> u64 {
    seed ^ run_number.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
