//! Period to comparator arithmetic
//!
//! Channels run in CTC mode: the counter climbs from 0 to the compare value
//! and raises the match interrupt as it resets, so one period lasts
//! `compare + 1` ticks.
//!
//! ```text
//! tick    = prescaler / clock_hz
//! compare = floor(period / tick) - 1
//! ```

use crate::config::ClockConfig;

/// Comparator value for a requested period, plus the period it was clamped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Interval {
    /// Period in milliseconds after clamping to `[1, max_interval_ms]`
    pub period_ms: u32,
    /// Value for the 16-bit compare register
    pub compare: u16,
}

impl Interval {
    /// Compute the comparator for `period_ms` under `clock`
    ///
    /// Out-of-range requests are clamped rather than rejected; compare the
    /// returned [`period_ms`](Self::period_ms) with the request to detect it.
    pub const fn from_period_ms(period_ms: u32, clock: &ClockConfig) -> Self {
        // Upper bound first: a clock too fast for a whole millisecond still
        // yields a 1ms request with a saturated comparator
        let max = clock.max_interval_ms();
        let period_ms = if period_ms > max { max } else { period_ms };
        let period_ms = if period_ms < 1 { 1 } else { period_ms };

        let ticks =
            period_ms as u64 * clock.clock_hz() as u64 / (1000 * clock.prescaler() as u64);
        // 0 is counted too
        let compare = ticks.saturating_sub(1);
        let compare = if compare > u16::MAX as u64 {
            u16::MAX
        } else {
            compare as u16
        };

        Self { period_ms, compare }
    }

    /// Whether `requested` had to be clamped to produce this interval
    pub const fn was_clamped(&self, requested: u32) -> bool {
        self.period_ms != requested
    }

    /// Period the hardware actually produces, in microseconds
    ///
    /// Never longer than [`period_ms`](Self::period_ms) and never shorter than
    /// a single tick.
    pub const fn actual_period_us(&self, clock: &ClockConfig) -> u64 {
        (self.compare as u64 + 1) * clock.prescaler() as u64 * 1_000_000
            / clock.clock_hz() as u64
    }
}
