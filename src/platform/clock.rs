//! Frame clock

use crate::consts::MAX_FRAME_DT_MS;

/// Turns host timestamps (ms) into per-frame deltas, capped so a long stall
/// (backgrounded tab, debugger) cannot teleport the body through a pipe.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_ts: Option<f64>,
    max_dt_ms: f64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(MAX_FRAME_DT_MS)
    }
}

impl FrameClock {
    pub fn new(max_dt_ms: f64) -> Self {
        Self {
            last_ts: None,
            max_dt_ms,
        }
    }

    /// Delta since the previous call, in ms. The first call after a reset returns 0.
    pub fn advance(&mut self, now_ms: f64) -> f64 {
        let dt = match self.last_ts {
            Some(last) => (now_ms - last).min(self.max_dt_ms).max(0.0),
            None => 0.0,
        };
        self.last_ts = Some(now_ms);
        dt
    }

    /// Forget the last timestamp (new run, resumed loop)
    pub fn reset(&mut self) {
        self.last_ts = None;
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.advance(1234.0), 0.0);
        assert_eq!(clock.advance(1250.0), 16.0);
    }

    #[test]
    fn test_delta_is_capped() {
        let mut clock = FrameClock::default();
        clock.advance(0.0);
        assert_eq!(clock.advance(10_000.0), MAX_FRAME_DT_MS);
    }

    #[test]
    fn test_backwards_timestamp_is_zero() {
        let mut clock = FrameClock::default();
        clock.advance(100.0);
        assert_eq!(clock.advance(90.0), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut clock = FrameClock::default();
        clock.advance(100.0);
        clock.reset();
        assert_eq!(clock.last_timestamp(), None);
        assert_eq!(clock.advance(500.0), 0.0);
    }
}
