//! Build-time configuration: channel count, clock, and prescaler
//!
//! The channel count is chosen with exactly one of the `channels-1`,
//! `channels-2` or `channels-4` features. The timer input clock comes from
//! the build script (`SYSTIMER_CLOCK_HZ`, defaulting per backend).

include!(concat!(env!("OUT_DIR"), "/_generated.rs"));

/// Fixed clock-divide factor applied before the timer counts
pub const PRESCALER: u32 = 1024;

/// Number of timer channels managed by this build
pub const CHANNEL_COUNT: usize = if cfg!(feature = "channels-4") {
    4
} else if cfg!(feature = "channels-2") {
    2
} else {
    1
};

/// Longest period, in milliseconds, representable with the active clock
pub const MAX_INTERVAL_MS: u32 = ClockConfig::ACTIVE.max_interval_ms();

/// Compile-time check to ensure exactly one channel count is selected
const _: () = {
    let selected = 0
        + if cfg!(feature = "channels-1") { 1 } else { 0 }
        + if cfg!(feature = "channels-2") { 1 } else { 0 }
        + if cfg!(feature = "channels-4") { 1 } else { 0 };

    if selected == 0 {
        panic!("No channel count selected for systimer. Enable exactly one of: channels-1, channels-2, channels-4");
    }
    if selected > 1 {
        panic!("Multiple channel counts selected for systimer. Enable exactly one of: channels-1, channels-2, channels-4");
    }
};

const _: () = assert!(
    MAX_INTERVAL_MS >= 1,
    "SYSTIMER_CLOCK_HZ is too fast for a 16-bit comparator at prescaler 1024"
);

/// Clock and prescaler pair that determines the tick length of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    clock_hz: u32,
    prescaler: u32,
}

impl ClockConfig {
    /// The configuration every channel is programmed with
    pub const ACTIVE: Self = Self::new(CLOCK_HZ, PRESCALER);

    /// Create a clock configuration
    ///
    /// # Panics
    ///
    /// If either value is zero; in a `const` this is a build error.
    pub const fn new(clock_hz: u32, prescaler: u32) -> Self {
        assert!(clock_hz != 0, "clock_hz must be non-zero");
        assert!(prescaler != 0, "prescaler must be non-zero");
        Self {
            clock_hz,
            prescaler,
        }
    }

    /// Timer input clock in Hz
    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Clock-divide factor applied before counting
    pub const fn prescaler(&self) -> u32 {
        self.prescaler
    }

    /// Length of one counter tick in nanoseconds, rounded down
    ///
    /// 16MHz / 1024 gives 64000ns (64us).
    pub const fn tick_ns(&self) -> u64 {
        self.prescaler as u64 * 1_000_000_000 / self.clock_hz as u64
    }

    /// Largest period, in whole milliseconds, a 16-bit comparator can hold
    ///
    /// 16MHz / 1024: 64us * 65535 = 4.19424s, so 4194ms.
    pub const fn max_interval_ms(&self) -> u32 {
        let max = u16::MAX as u64 * self.prescaler as u64 * 1000 / self.clock_hz as u64;
        if max > u32::MAX as u64 {
            u32::MAX
        } else {
            max as u32
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::ACTIVE
    }
}

/// Logical timer slot, bound 1:1 to one physical hardware timer
///
/// Only the variants for the configured channel count exist, so a channel
/// outside the table cannot be named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel 0 (AVR: TC1, GBA: timer 2)
    Ch0,
    /// Channel 1 (AVR: TC3, GBA: timer 3)
    #[cfg(any(feature = "channels-2", feature = "channels-4"))]
    Ch1,
    /// Channel 2 (AVR: TC4)
    #[cfg(feature = "channels-4")]
    Ch2,
    /// Channel 3 (AVR: TC5)
    #[cfg(feature = "channels-4")]
    Ch3,
}

impl Channel {
    /// Every configured channel, in index order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Ch0,
        #[cfg(any(feature = "channels-2", feature = "channels-4"))]
        Channel::Ch1,
        #[cfg(feature = "channels-4")]
        Channel::Ch2,
        #[cfg(feature = "channels-4")]
        Channel::Ch3,
    ];

    /// Look up a channel by index, `None` if the build has fewer channels
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < CHANNEL_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Position of this channel in the dispatch table
    pub const fn index(self) -> usize {
        self as usize
    }
}
