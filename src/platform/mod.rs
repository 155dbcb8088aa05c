//! Platform abstraction layer
//!
//! The host (browser animation frame, terminal loop, test harness) hands the
//! game a monotonically increasing timestamp once per display refresh. The
//! clock turns those into capped frame deltas.

mod clock;

pub use clock::FrameClock;
