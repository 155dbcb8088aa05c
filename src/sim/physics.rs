//! Body integrator
//!
//! All per-frame tuning (gravity, flap force, fall speed) is expressed per
//! reference frame; `frame_factor` turns a wall-clock delta into reference frames.

use super::state::Body;
use crate::consts::REFERENCE_FRAME_MS;
use crate::settings::{BirdConfig, FlapAnimConfig, TiltConfig};
use crate::{clamp, lerp, map_range_clamped};

/// Reference frames elapsed in `dt_ms`
#[inline]
pub fn frame_factor(dt_ms: f64) -> f32 {
    (dt_ms.max(0.0) / REFERENCE_FRAME_MS as f64) as f32
}

/// Advance velocity and position by `t` reference frames.
///
/// During the grace period velocity may not become positive, so the body
/// never descends. The body never rises above the top edge.
pub fn integrate(body: &mut Body, gravity: f32, max_fall: f32, t: f32, in_grace: bool) {
    body.vy += gravity * t;
    body.vy = if in_grace {
        body.vy.min(0.0)
    } else {
        body.vy.min(max_fall)
    };
    body.y = (body.y + body.vy * t).max(0.0);
}

/// Free fall used by the death sequence; no ceiling
pub fn integrate_fall(body: &mut Body, gravity: f32, max_fall: f32, t: f32) {
    body.vy = (body.vy + gravity * t).min(max_fall);
    body.y += body.vy * t;
}

/// Apply a flap at `now_ms`.
///
/// Returns false (and changes nothing) when the previous accepted flap is
/// closer than `min_interval_ms`.
pub fn apply_flap(body: &mut Body, bird: &BirdConfig, min_interval_ms: f64, now_ms: f64) -> bool {
    if let Some(last) = body.last_flap_ms
        && now_ms - last < min_interval_ms
    {
        return false;
    }
    body.last_flap_ms = Some(now_ms);
    body.vy = -bird.flap_force.abs();

    let tilt = &bird.tilt;
    if tilt.enabled && tilt.snap_on_flap {
        body.tilt_deg = clamp(tilt.up_deg, tilt.min_deg, tilt.max_deg);
    }

    let anim = &bird.flap_anim;
    if anim.enabled {
        body.anim_start_ms = now_ms;
        body.anim_end_ms = now_ms + anim.duration_ms;
    }
    true
}

/// Ease the tilt toward the angle implied by the current velocity
pub fn update_tilt(body: &mut Body, bird: &BirdConfig, t: f32) {
    let tilt: &TiltConfig = &bird.tilt;
    if !tilt.enabled {
        body.tilt_deg = 0.0;
        return;
    }
    let v_up = -tilt.vel_for_max_up.unwrap_or(bird.flap_force).abs();
    let v_down = tilt.vel_for_max_down.unwrap_or(bird.max_fall_speed).abs();
    let target = map_range_clamped(body.vy, v_up, v_down, tilt.up_deg, tilt.down_deg);
    let alpha = 1.0 - (1.0 - clamp(tilt.responsiveness, 0.0, 1.0)).powf(t);
    body.tilt_deg = clamp(lerp(body.tilt_deg, target, alpha), tilt.min_deg, tilt.max_deg);
}

/// Displayed animation frame at `now_ms` for a sprite sheet of `frames` frames
pub fn update_frame(body: &mut Body, anim: &FlapAnimConfig, frames: usize, now_ms: f64) {
    body.frame = if frames > 1 && anim.fps > 0.0 && now_ms < body.anim_end_ms {
        let elapsed = (now_ms - body.anim_start_ms).max(0.0) / 1000.0;
        (elapsed * anim.fps).floor() as usize % frames
    } else {
        0
    };
}
