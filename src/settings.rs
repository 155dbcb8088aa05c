//! Game tuning
//!
//! Compiled-in defaults, overridden at boot by a JSON document fetched by slug.
//! Remote documents are deep-merged over the defaults and then sanitized, so a
//! partial or slightly malformed document never prevents a run from starting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::{
    AUTO_BIRD_TRIGGER_FRACTION, DEFAULT_BIRD_ASPECT, DESIGN_BOARD_HEIGHT, DESIGN_BOARD_WIDTH,
    MIN_AUTO_BIRD_PERCENT, MIN_LEGACY_SPAWN_INTERVAL_MS,
};
use crate::error::Result;
use crate::highscores::PrizeGroup;

/// Play area
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardConfig {
    pub width: f32,
    pub height: f32,
    /// Fill color used when the background sprite is missing
    pub background: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: DESIGN_BOARD_WIDTH,
            height: DESIGN_BOARD_HEIGHT,
            background: "#70c5ce".to_string(),
        }
    }
}

/// Visual tilt of the body, driven by its vertical velocity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TiltConfig {
    pub enabled: bool,
    /// Angle at full upward speed (degrees, negative = nose up)
    pub up_deg: f32,
    /// Angle at full downward speed
    pub down_deg: f32,
    /// Per-reference-frame smoothing factor (0..1)
    pub responsiveness: f32,
    /// Upward speed mapped to `up_deg` (defaults to the flap force)
    pub vel_for_max_up: Option<f32>,
    /// Downward speed mapped to `down_deg` (defaults to the max fall speed)
    pub vel_for_max_down: Option<f32>,
    /// Jump straight to `up_deg` on flap instead of easing
    pub snap_on_flap: bool,
    pub min_deg: f32,
    pub max_deg: f32,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            up_deg: -25.0,
            down_deg: 70.0,
            responsiveness: 0.15,
            vel_for_max_up: Some(6.0),
            vel_for_max_down: Some(12.0),
            snap_on_flap: true,
            min_deg: -45.0,
            max_deg: 90.0,
        }
    }
}

/// Wing animation played after each flap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlapAnimConfig {
    pub enabled: bool,
    pub duration_ms: f64,
    pub fps: f64,
}

impl Default for FlapAnimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 1000.0,
            fps: 12.0,
        }
    }
}

/// The controlled body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BirdConfig {
    pub width: f32,
    pub height: f32,
    pub start_x_percent: f32,
    pub start_y_percent: f32,
    /// Upward speed set by a flap (units per reference frame)
    pub flap_force: f32,
    /// Terminal fall speed (units per reference frame)
    pub max_fall_speed: f32,
    /// Hitbox inset on every side
    pub hitbox_padding: f32,
    /// Body height as a percentage of board height (0 = off)
    pub size_percent_of_height: f32,
    /// Always apply `size_percent_of_height`, not only when the body is tiny
    pub respect_size_percent: bool,
    pub tilt: TiltConfig,
    pub flap_anim: FlapAnimConfig,
}

impl Default for BirdConfig {
    fn default() -> Self {
        Self {
            width: 34.0,
            height: 24.0,
            start_x_percent: 12.5,
            start_y_percent: 50.0,
            flap_force: 6.0,
            max_fall_speed: 12.0,
            hitbox_padding: 2.0,
            size_percent_of_height: 0.0,
            respect_size_percent: false,
            tilt: TiltConfig::default(),
            flap_anim: FlapAnimConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsConfig {
    /// Downward acceleration (units per reference frame, per reference frame)
    pub gravity: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self { gravity: 0.4 }
    }
}

/// Obstacle geometry and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipeConfig {
    /// Design width; also the width the alpha masks are built at
    pub width: f32,
    /// Design height; also the height the alpha masks are built at
    pub height: f32,
    /// Base scroll speed (units per reference frame)
    pub scroll_speed: f32,
    /// Base gap as a percentage of board height
    pub gap_percent: f32,
    /// Start of the random gap-center band, as a percentage of the free space
    pub random_base_percent: f32,
    /// Width of the random gap-center band, as a percentage of the free space
    pub random_range_percent: f32,
    /// Grow pipes so they always reach the board edges
    pub auto_stretch_to_edges: bool,
    /// How far a pipe end may overshoot the board edge
    pub edge_overflow_px: f32,
    /// Desired horizontal distance between consecutive pairs
    pub min_horizontal_spacing_px: Option<f32>,
    /// Max gap-center shift between consecutive pairs, as a percentage of board height
    pub max_center_shift_percent: Option<f32>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            width: 64.0,
            height: 512.0,
            scroll_speed: 2.0,
            gap_percent: 25.0,
            random_base_percent: 25.0,
            random_range_percent: 50.0,
            auto_stretch_to_edges: false,
            edge_overflow_px: 0.0,
            min_horizontal_spacing_px: None,
            max_center_shift_percent: None,
        }
    }
}

/// Fixed spawn cadence of older config documents.
///
/// Parsed and rescaled with the board so stored documents keep round-tripping;
/// the spawner derives its interval from spacing and speed instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnConfig {
    pub interval_ms: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self { interval_ms: 1500.0 }
    }
}

/// Difficulty ramp coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DifficultyConfig {
    // === Score ramp ===
    pub ramp_enabled: bool,
    pub speed_per_score: f32,
    pub min_gap_percent: f32,
    pub gap_step_per_score: f32,

    // === Time ramp ===
    pub time_ramp_enabled: bool,
    /// Active time only starts counting this long after the grace period
    pub time_start_delay_ms: f64,
    pub time_speed_per_sec: f32,
    pub time_max_extra_speed: f32,
    pub time_gap_step_per_sec: f32,

    // === Step ramp ===
    pub step_every_ms: f64,
    pub step_add_px_per_frame: f32,
    pub step_max_extra_px_per_frame: f32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            ramp_enabled: false,
            speed_per_score: 0.05,
            min_gap_percent: 18.0,
            gap_step_per_score: 0.2,

            time_ramp_enabled: true,
            time_start_delay_ms: 0.0,
            time_speed_per_sec: 0.03,
            time_max_extra_speed: 5.0,
            time_gap_step_per_sec: 0.02,

            step_every_ms: 2000.0,
            step_add_px_per_frame: 0.30,
            step_max_extra_px_per_frame: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Points per pipe; a pair is two pipes
    pub points_per_pipe: f64,
    /// Points per passed pair, overrides `points_per_pipe` when set
    pub points_per_obstacle: Option<f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_per_pipe: 0.5,
            points_per_obstacle: None,
        }
    }
}

impl ScoringConfig {
    /// Score added when the body clears one obstacle pair
    pub fn increment(&self) -> f64 {
        self.points_per_obstacle
            .unwrap_or(self.points_per_pipe * 2.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsConfig {
    /// Flaps closer together than this are dropped
    pub min_flap_interval_ms: f64,
    /// Accept auto-repeated key events as flaps
    pub allow_hold_to_flap: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            min_flap_interval_ms: 120.0,
            allow_hold_to_flap: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GameplayConfig {
    /// A flap on the game-over screen starts the next run
    pub restart_on_jump: bool,
    /// The body cannot descend for this long after the first flap
    pub grace_period_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollisionConfig {
    /// Rotation-aware pixel test after the box test
    pub bird_pixel_perfect: bool,
    /// Body pixels at or below this alpha are ignored
    pub alpha_threshold: f32,
    /// Pipe pixels above this alpha become mask bits
    pub pipe_alpha_threshold: f32,
    /// Inset used instead of the mask when it is missing
    pub pipe_fallback_inset_px: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            bird_pixel_perfect: true,
            alpha_threshold: 10.0,
            pipe_alpha_threshold: 10.0,
            pipe_fallback_inset_px: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeathConfig {
    pub flash_ms: f64,
    /// How long the body holds its impact position
    pub freeze_ms: f64,
    pub fall_gravity_scale: f32,
    pub flash_color: String,
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            flash_ms: 140.0,
            freeze_ms: 1000.0,
            fall_gravity_scale: 1.0,
            flash_color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundConfig {
    /// Fraction of the pipe speed the background scrolls at
    pub parallax_factor: f32,
    /// Fixed background speed in px/sec, used instead of parallax when > 0
    pub fixed_px_per_sec: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            parallax_factor: 0.5,
            fixed_px_per_sec: 0.0,
        }
    }
}

fn unit_scale() -> f32 {
    1.0
}

/// Complete game tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub board: BoardConfig,
    pub bird: BirdConfig,
    pub physics: PhysicsConfig,
    pub pipes: PipeConfig,
    pub spawn: SpawnConfig,
    pub difficulty: DifficultyConfig,
    pub scoring: ScoringConfig,
    pub controls: ControlsConfig,
    pub gameplay: GameplayConfig,
    pub collision: CollisionConfig,
    pub death: DeathConfig,
    pub bg: BackgroundConfig,
    pub prizes: Vec<PrizeGroup>,
    /// Uniform scale applied by [`Config::fit_board`]
    #[serde(skip, default = "unit_scale")]
    pub scale: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            bird: BirdConfig::default(),
            physics: PhysicsConfig::default(),
            pipes: PipeConfig::default(),
            spawn: SpawnConfig::default(),
            difficulty: DifficultyConfig::default(),
            scoring: ScoringConfig::default(),
            controls: ControlsConfig::default(),
            gameplay: GameplayConfig::default(),
            collision: CollisionConfig::default(),
            death: DeathConfig::default(),
            bg: BackgroundConfig::default(),
            prizes: vec![
                PrizeGroup::new(1.0, 10.0, "Group A"),
                PrizeGroup::new(10.0, 15.0, "Group B"),
                PrizeGroup::new(15.0, 25.0, "Group C"),
            ],
            scale: 1.0,
        }
    }
}

/// Source of remote tuning documents, keyed by slug
pub trait ConfigSource {
    /// Fetch the document stored under `slug`; `Ok(None)` when nothing is stored
    fn fetch(&self, slug: &str) -> Result<Option<Value>>;
}

impl<F> ConfigSource for F
where
    F: Fn(&str) -> Result<Option<Value>>,
{
    fn fetch(&self, slug: &str) -> Result<Option<Value>> {
        self(slug)
    }
}

impl Config {
    /// Fetch the document for `slug` and merge it over the defaults.
    ///
    /// Any failure falls back to the compiled-in defaults; booting never fails.
    pub fn load(source: &dyn ConfigSource, slug: &str) -> Self {
        match source.fetch(slug) {
            Ok(Some(doc)) => {
                log::info!("Loaded config overrides for slug {:?}", slug);
                Self::from_overrides(&doc)
            }
            Ok(None) => {
                log::info!("No config stored for slug {:?}, using defaults", slug);
                Self::default()
            }
            Err(e) => {
                log::warn!("Config fetch for slug {:?} failed ({}), using defaults", slug, e);
                Self::default()
            }
        }
    }

    /// Merge a JSON document over the defaults and sanitize the result
    pub fn from_overrides(overrides: &Value) -> Self {
        let mut merged = default_value();
        merge_json(&mut merged, overrides);
        let cfg = match serde_json::from_value::<Config>(merged) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Config overrides rejected ({}), applying sections one by one", e);
                Self::from_sections(overrides)
            }
        };
        cfg.sanitized()
    }

    /// Keep every top-level section that deserializes on its own, drop the rest
    fn from_sections(overrides: &Value) -> Self {
        let mut accepted = default_value();
        if let Value::Object(sections) = overrides {
            for (key, section) in sections {
                let mut candidate = accepted.clone();
                let mut patch = Map::new();
                patch.insert(key.clone(), section.clone());
                merge_json(&mut candidate, &Value::Object(patch));
                if serde_json::from_value::<Config>(candidate.clone()).is_ok() {
                    accepted = candidate;
                } else {
                    log::warn!("Ignoring malformed config section {:?}", key);
                }
            }
        }
        serde_json::from_value(accepted).unwrap_or_default()
    }

    /// Clamp values that would break the ramp/placement invariants
    pub fn sanitized(mut self) -> Self {
        let b = &mut self.board;
        b.width = b.width.max(1.0);
        b.height = b.height.max(1.0);

        let bird = &mut self.bird;
        bird.width = bird.width.max(1.0);
        bird.height = bird.height.max(1.0);
        bird.flap_force = bird.flap_force.abs();
        bird.max_fall_speed = bird.max_fall_speed.max(0.0);
        bird.hitbox_padding = bird.hitbox_padding.max(0.0);
        bird.size_percent_of_height = crate::clamp(bird.size_percent_of_height, 0.0, 100.0);
        bird.tilt.responsiveness = crate::clamp(bird.tilt.responsiveness, 0.0, 1.0);
        bird.flap_anim.duration_ms = bird.flap_anim.duration_ms.max(0.0);
        bird.flap_anim.fps = bird.flap_anim.fps.max(0.0);

        self.physics.gravity = self.physics.gravity.max(0.0);

        let p = &mut self.pipes;
        p.width = p.width.max(1.0);
        p.height = p.height.max(1.0);
        p.gap_percent = crate::clamp(p.gap_percent, 0.0, 100.0);
        p.random_base_percent = crate::clamp(p.random_base_percent, 0.0, 100.0);
        p.random_range_percent = crate::clamp(p.random_range_percent, 0.0, 100.0);
        p.edge_overflow_px = p.edge_overflow_px.max(0.0);
        p.min_horizontal_spacing_px = p.min_horizontal_spacing_px.map(|s| s.max(0.0));
        p.max_center_shift_percent = p.max_center_shift_percent.map(|s| s.max(0.0));
        self.spawn.interval_ms = self.spawn.interval_ms.max(MIN_LEGACY_SPAWN_INTERVAL_MS);

        // Negative coefficients would let speed drop or the gap grow mid-run
        let d = &mut self.difficulty;
        d.speed_per_score = d.speed_per_score.max(0.0);
        d.min_gap_percent = crate::clamp(d.min_gap_percent, 0.0, 100.0);
        d.gap_step_per_score = d.gap_step_per_score.max(0.0);
        d.time_start_delay_ms = d.time_start_delay_ms.max(0.0);
        d.time_speed_per_sec = d.time_speed_per_sec.max(0.0);
        d.time_max_extra_speed = d.time_max_extra_speed.max(0.0);
        d.time_gap_step_per_sec = d.time_gap_step_per_sec.max(0.0);
        d.step_every_ms = d.step_every_ms.max(1.0);
        d.step_add_px_per_frame = d.step_add_px_per_frame.max(0.0);
        d.step_max_extra_px_per_frame = d.step_max_extra_px_per_frame.max(0.0);

        self.scoring.points_per_pipe = self.scoring.points_per_pipe.max(0.0);
        self.scoring.points_per_obstacle = self.scoring.points_per_obstacle.map(|p| p.max(0.0));

        self.controls.min_flap_interval_ms = self.controls.min_flap_interval_ms.max(0.0);
        self.gameplay.grace_period_ms = self.gameplay.grace_period_ms.max(0.0);

        let c = &mut self.collision;
        c.alpha_threshold = crate::clamp(c.alpha_threshold, 0.0, 255.0);
        c.pipe_alpha_threshold = crate::clamp(c.pipe_alpha_threshold, 0.0, 255.0);
        c.pipe_fallback_inset_px = c.pipe_fallback_inset_px.max(0.0);

        let death = &mut self.death;
        death.flash_ms = death.flash_ms.max(0.0);
        death.freeze_ms = death.freeze_ms.max(0.0);
        death.fall_gravity_scale = death.fall_gravity_scale.max(0.0);

        self.bg.parallax_factor = self.bg.parallax_factor.max(0.0);
        self.bg.fixed_px_per_sec = self.bg.fixed_px_per_sec.max(0.0);

        self
    }

    /// Resize the board to `width × height` and scale sizes, forces and speeds
    /// uniformly from the design board.
    pub fn fit_board(mut self, width: f32, height: f32) -> Self {
        self.board.width = width.max(1.0);
        self.board.height = height.max(1.0);

        let s = (self.board.width / DESIGN_BOARD_WIDTH).min(self.board.height / DESIGN_BOARD_HEIGHT);
        if !(s > 0.0) || (s - 1.0).abs() < 1e-6 {
            return self;
        }

        let bird = &mut self.bird;
        bird.width = (bird.width * s).round();
        bird.height = (bird.height * s).round();
        bird.hitbox_padding = (bird.hitbox_padding * s).round();
        bird.flap_force *= s;
        bird.max_fall_speed *= s;
        bird.tilt.vel_for_max_up = bird.tilt.vel_for_max_up.map(|v| v * s);
        bird.tilt.vel_for_max_down = bird.tilt.vel_for_max_down.map(|v| v * s);

        let p = &mut self.pipes;
        p.width = (p.width * s).round();
        p.height = (p.height * s).round();
        p.edge_overflow_px = (p.edge_overflow_px * s).round();
        p.scroll_speed *= s;
        p.min_horizontal_spacing_px = p.min_horizontal_spacing_px.map(|v| v * s);

        self.physics.gravity *= s;
        let interval = self.spawn.interval_ms.max(MIN_LEGACY_SPAWN_INTERVAL_MS);
        self.spawn.interval_ms = (interval / f64::from(s)).round().max(MIN_LEGACY_SPAWN_INTERVAL_MS);
        self.scale = s;
        self
    }

    /// Resize a body that would be too small to see on this board.
    ///
    /// With `respect_size_percent` the body height is always set to
    /// `size_percent_of_height` of the board. Otherwise a body shorter than 4%
    /// of the board grows to `max(6, size_percent_of_height)` percent. Width
    /// follows `aspect` (width / height of the decoded frame).
    pub fn autosize_bird(mut self, aspect: Option<f32>) -> Self {
        let bird = &self.bird;
        let percent = bird.size_percent_of_height.max(0.0);
        let target_percent = if bird.respect_size_percent && percent > 0.0 {
            percent
        } else if bird.height < self.board.height * AUTO_BIRD_TRIGGER_FRACTION {
            percent.max(MIN_AUTO_BIRD_PERCENT)
        } else {
            return self;
        };

        let aspect = aspect.filter(|a| a.is_finite() && *a > 0.0).unwrap_or(DEFAULT_BIRD_ASPECT);
        let height = (self.board.height * target_percent / 100.0).round().max(1.0);
        let width = (height * aspect).round().max(1.0);
        log::info!(
            "Body resized from {}x{} to {}x{}",
            self.bird.width,
            self.bird.height,
            width,
            height
        );
        self.bird.width = width;
        self.bird.height = height;
        self
    }

    /// Gravity for the post-hit fall; a weightless config still drops the body
    pub fn death_fall_gravity(&self) -> f32 {
        let gravity = if self.physics.gravity > 0.0 {
            self.physics.gravity
        } else {
            PhysicsConfig::default().gravity * self.scale
        };
        let scaled = gravity * self.death.fall_gravity_scale;
        if scaled > 0.0 { scaled } else { gravity }
    }

    /// Terminal speed for the post-hit fall
    pub fn death_max_fall_speed(&self) -> f32 {
        if self.bird.max_fall_speed > 0.0 {
            self.bird.max_fall_speed
        } else {
            BirdConfig::default().max_fall_speed * self.scale
        }
    }

    /// Gap size in world units for a gap percentage
    pub fn gap_for_percent(&self, percent: f32) -> f32 {
        self.board.height * percent / 100.0
    }
}

fn default_value() -> Value {
    serde_json::to_value(Config::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Deep merge: objects merge recursively, everything else overwrites. Nulls are skipped.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            if !overlay.is_null() {
                *base = overlay.clone();
            }
        }
    }
}
