//! Simulation state and run lifecycle
//!
//! Everything a run mutates lives in [`SimulationState`]. Starting a new run
//! replaces the whole structure, which also drops the pending spawn countdown.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::background::BackgroundScroll;
use super::rect::Rect;
use super::spawner::Placement;
use super::sprite::PipeKind;
use crate::settings::Config;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    /// Waiting for the first flap; physics, spawning and collision are off
    Idle,
    /// Body flies, pipes spawn and scroll, collisions are checked
    Active,
    /// Hit something; world frozen, body holds then falls off screen
    Dying,
    /// Run over, score handed to the ledger
    Terminated,
}

/// Inputs to the run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunEvent {
    Flap,
    Collision,
    FloorFall,
    ExitScreen,
    /// Back to the start screen
    Reset,
    /// Start the next run straight from the game-over screen
    Restart,
}

impl RunPhase {
    /// Next phase for `event`, `None` when the event means nothing here
    pub fn on(self, event: RunEvent) -> Option<RunPhase> {
        use RunEvent::*;
        use RunPhase::*;
        match (self, event) {
            (_, Reset) => Some(Idle),
            (Idle, Flap) | (Active, Flap) => Some(Active),
            (Active, Collision) | (Active, FloorFall) => Some(Dying),
            (Dying, ExitScreen) => Some(Terminated),
            (Terminated, Restart) => Some(Active),
            _ => None,
        }
    }

    /// Physics and the death sequence run in these phases
    pub fn is_live(self) -> bool {
        matches!(self, RunPhase::Active | RunPhase::Dying)
    }

    /// Pause only applies before death
    pub fn is_pausable(self) -> bool {
        matches!(self, RunPhase::Idle | RunPhase::Active)
    }
}

/// The controlled body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub w: f32,
    pub h: f32,
    pub padding: f32,
    pub tilt_deg: f32,
    /// Displayed animation frame
    pub frame: usize,
    /// Timestamp of the last accepted flap
    pub last_flap_ms: Option<f64>,
    pub anim_start_ms: f64,
    pub anim_end_ms: f64,
}

impl Body {
    /// Body at its configured start position
    pub fn spawn(cfg: &Config) -> Self {
        Self {
            x: cfg.board.width * cfg.bird.start_x_percent / 100.0,
            y: cfg.board.height * cfg.bird.start_y_percent / 100.0,
            vy: 0.0,
            w: cfg.bird.width,
            h: cfg.bird.height,
            padding: cfg.bird.hitbox_padding.max(0.0),
            tilt_deg: 0.0,
            frame: 0,
            last_flap_ms: None,
            anim_start_ms: 0.0,
            anim_end_ms: 0.0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Body rectangle shrunk by the hitbox padding
    pub fn hitbox(&self) -> Rect {
        self.rect().inset(self.padding)
    }
}

/// Top and bottom obstacle sharing one x position
#[derive(Debug, Clone, PartialEq)]
pub struct ObstaclePair {
    pub id: u32,
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub top_y: f32,
    pub bottom_y: f32,
    pub gap_center: f32,
    pub gap: f32,
    /// Set once the body has cleared this pair
    pub passed: bool,
}

impl ObstaclePair {
    pub fn new(id: u32, x: f32, width: f32, placement: Placement) -> Self {
        Self {
            id,
            x,
            width,
            height: placement.pipe_height,
            top_y: placement.top_y,
            bottom_y: placement.bottom_y,
            gap_center: placement.center,
            gap: placement.gap,
            passed: false,
        }
    }

    pub fn rect(&self, kind: PipeKind) -> Rect {
        match kind {
            PipeKind::Top => Rect::new(self.x, self.top_y, self.width, self.height),
            PipeKind::Bottom => Rect::new(self.x, self.bottom_y, self.width, self.height),
        }
    }

    /// Trailing edge the body must pass to score
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Fully scrolled past the left edge
    #[inline]
    pub fn is_off_screen(&self) -> bool {
        self.x < -self.width
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Collision,
    FloorFall,
}

/// Timeline of the death sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathState {
    pub cause: DeathCause,
    pub hit_ms: f64,
    pub flash_end_ms: f64,
    pub freeze_until_ms: f64,
    pub hold_y: f32,
    pub hold_tilt: f32,
}

impl DeathState {
    pub fn start(cfg: &Config, body: &Body, cause: DeathCause, now_ms: f64) -> Self {
        Self {
            cause,
            hit_ms: now_ms,
            flash_end_ms: now_ms + cfg.death.flash_ms.max(0.0),
            freeze_until_ms: now_ms + cfg.death.freeze_ms.max(0.0),
            hold_y: crate::clamp(body.y, 0.0, cfg.board.height - body.h),
            hold_tilt: body.tilt_deg,
        }
    }

    pub fn is_frozen(&self, now_ms: f64) -> bool {
        now_ms < self.freeze_until_ms
    }

    /// Flash opacity at `now_ms`, fading linearly from 1 to 0
    pub fn flash_alpha(&self, now_ms: f64) -> f32 {
        if now_ms >= self.flash_end_ms {
            return 0.0;
        }
        let span = self.flash_end_ms - self.hit_ms;
        if span <= 0.0 {
            return 0.0;
        }
        crate::clamp((1.0 - (now_ms - self.hit_ms) / span) as f32, 0.0, 1.0)
    }
}

/// Bookkeeping of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// Monotonic per-process run counter
    pub run_number: u64,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Frame time of the first flap
    pub start_ms: Option<f64>,
    /// Frame time the run terminated
    pub end_ms: Option<f64>,
    pub score: f64,
}

impl RunState {
    pub fn new(run_number: u64) -> Self {
        Self {
            run_number,
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            start_ms: None,
            end_ms: None,
            score: 0.0,
        }
    }

    /// Wall-clock length of the run in ms
    pub fn duration_ms(&self) -> f64 {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        }
    }
}

/// Something that happened during a frame, for audio and UI hooks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A run started (first flap)
    RunStarted { run_number: u64 },
    Flap,
    Score { total: f64 },
    Hit { cause: DeathCause },
    GameOver { score: f64 },
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Seed of the placement RNG
    pub seed: u64,
    pub rng: Pcg32,
    pub phase: RunPhase,
    pub paused: bool,
    pub run: RunState,
    pub body: Body,
    /// Live pairs, oldest first
    pub pipes: Vec<ObstaclePair>,
    pub death: Option<DeathState>,
    pub background: BackgroundScroll,
    /// Time until the next spawn; `None` until the first flap
    pub spawn_countdown_ms: Option<f64>,
    /// Active play time feeding the time ramps
    pub active_time_ms: f64,
    /// Body cannot descend before this
    pub grace_until_ms: f64,
    /// Active time only accrues after this
    pub ramp_start_ms: f64,
    /// Scroll speed of the last active frame (units per reference frame)
    pub scroll_speed: f32,
    /// Gap center of the newest pair
    pub last_center: Option<f32>,
    /// Timestamp of the last stepped frame
    pub time_ms: f64,
    next_id: u32,
}

impl SimulationState {
    /// Fresh idle state for run `run_number`
    pub fn new(cfg: &Config, seed: u64, run_number: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: RunPhase::Idle,
            paused: false,
            run: RunState::new(run_number),
            body: Body::spawn(cfg),
            pipes: Vec::new(),
            death: None,
            background: BackgroundScroll::default(),
            spawn_countdown_ms: None,
            active_time_ms: 0.0,
            grace_until_ms: 0.0,
            ramp_start_ms: f64::INFINITY,
            scroll_speed: cfg.pipes.scroll_speed.abs(),
            last_center: None,
            time_ms: 0.0,
            next_id: 1,
        }
    }

    /// Allocate a new pair id
    pub fn next_pair_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Feed an event to the state machine; returns whether the phase changed
    pub fn transition(&mut self, event: RunEvent) -> bool {
        match self.phase.on(event) {
            Some(next) if next != self.phase => {
                log::debug!("Run {}: {:?} -> {:?}", self.run.run_number, self.phase, next);
                self.phase = next;
                true
            }
            _ => false,
        }
    }

    /// Frozen world: scroll and spawning stop from the hit onward
    pub fn world_frozen(&self) -> bool {
        matches!(self.phase, RunPhase::Dying | RunPhase::Terminated)
    }

    pub fn score(&self) -> f64 {
        self.run.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use RunEvent::*;
        use RunPhase::*;
        assert_eq!(Idle.on(Flap), Some(Active));
        assert_eq!(Active.on(Flap), Some(Active));
        assert_eq!(Active.on(Collision), Some(Dying));
        assert_eq!(Active.on(FloorFall), Some(Dying));
        assert_eq!(Dying.on(ExitScreen), Some(Terminated));
        assert_eq!(Terminated.on(Restart), Some(Active));
        for phase in [Idle, Active, Dying, Terminated] {
            assert_eq!(phase.on(Reset), Some(Idle));
        }
    }

    #[test]
    fn test_illegal_transitions_are_non_events() {
        use RunEvent::*;
        use RunPhase::*;
        assert_eq!(Dying.on(Flap), None);
        assert_eq!(Dying.on(Collision), None);
        assert_eq!(Idle.on(Collision), None);
        assert_eq!(Idle.on(ExitScreen), None);
        assert_eq!(Terminated.on(Flap), None);
        assert_eq!(Active.on(Restart), None);
        assert_eq!(Active.on(ExitScreen), None);
    }

    #[test]
    fn test_body_spawn() {
        let cfg = Config::default();
        let body = Body::spawn(&cfg);
        assert_eq!(body.x, 45.0);
        assert_eq!(body.y, 320.0);
        assert_eq!(body.hitbox(), Rect::new(47.0, 322.0, 30.0, 20.0));
    }

    #[test]
    fn test_death_hold_position_is_clamped() {
        let cfg = Config::default();
        let mut body = Body::spawn(&cfg);
        body.y = 700.0;
        let death = DeathState::start(&cfg, &body, DeathCause::FloorFall, 1000.0);
        assert_eq!(death.hold_y, 640.0 - 24.0);
        assert_eq!(death.freeze_until_ms, 2000.0);
        assert!(death.is_frozen(1999.9));
        assert!(!death.is_frozen(2000.0));
    }

    #[test]
    fn test_flash_alpha_fades() {
        let cfg = Config::default();
        let body = Body::spawn(&cfg);
        let death = DeathState::start(&cfg, &body, DeathCause::Collision, 0.0);
        assert_eq!(death.flash_alpha(0.0), 1.0);
        assert!((death.flash_alpha(70.0) - 0.5).abs() < 1e-6);
        assert_eq!(death.flash_alpha(140.0), 0.0);
    }

    #[test]
    fn test_pair_ids_are_unique() {
        let cfg = Config::default();
        let mut state = SimulationState::new(&cfg, 1, 1);
        let a = state.next_pair_id();
        let b = state.next_pair_id();
        assert_ne!(a, b);
        assert!(!state.run.run_id.is_empty());
    }
}
