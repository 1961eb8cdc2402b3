//! Register driver
//!
//! Four operations per channel, each run with interrupts masked so a
//! read-modify-write cannot be torn by the channel's own interrupt:
//!
//! - [`stop`]: clear the control registers (idempotent)
//! - [`init`]: stop, then enable the compare-match interrupt
//! - [`start`]: select clk/1024 and clear-on-compare, which starts counting
//! - [`set_interval`]: load the compare register
//!
//! The backend is picked at build time by cargo feature:
//!
//! | feature | hardware                              |
//! |---------|---------------------------------------|
//! | `avr`   | ATmega2560 TC1, TC3, TC4, TC5         |
//! | `gba`   | GBA timers 2, 3 through `agb` ([`gba::init`]) |
//! | none    | in-memory register model ([`host`])   |

use critical_section::CriticalSection;

use crate::config::Channel;

pub mod regs;

#[cfg(all(feature = "avr", feature = "gba"))]
compile_error!("The `avr` and `gba` backends are mutually exclusive");

cfg_if::cfg_if! {
    if #[cfg(feature = "avr")] {
        mod avr;
        type Active = avr::Avr;
    } else if #[cfg(feature = "gba")] {
        pub mod gba;
        type Active = gba::Gba;
    } else {
        pub mod host;
        type Active = host::Host;
    }
}

/// Per-family register access behind the driver functions
///
/// Everything except [`stop`](Backend::stop) receives the critical section
/// the caller holds.
pub(crate) trait Backend {
    /// Clear the channel's control registers
    fn stop(channel: Channel);

    /// Enable the compare-match interrupt for the channel
    fn enable_interrupt(cs: CriticalSection<'_>, channel: Channel);

    /// Select the prescaler and waveform mode, starting the counter
    fn start(cs: CriticalSection<'_>, channel: Channel);

    /// Load the compare register
    fn set_compare(cs: CriticalSection<'_>, channel: Channel, compare: u16);

    /// Whether a clock source is currently selected
    fn is_running(cs: CriticalSection<'_>, channel: Channel) -> bool;
}

/// Stop a channel by clearing its control registers
///
/// Safe to call on a stopped channel. Pass `disable_interrupts = false` only
/// when the caller already runs with interrupts masked.
pub fn stop(channel: Channel, disable_interrupts: bool) {
    if disable_interrupts {
        critical_section::with(|_| Active::stop(channel));
    } else {
        Active::stop(channel);
    }
}

/// Stop a channel and enable its compare-match interrupt
///
/// The channel is left stopped; [`start`] begins counting.
pub fn init(channel: Channel) {
    critical_section::with(|cs| {
        stop(channel, false);
        Active::enable_interrupt(cs, channel);
    });
}

/// Start counting with the fixed prescaler in clear-on-compare mode
pub fn start(channel: Channel) {
    critical_section::with(|cs| Active::start(cs, channel));
}

/// Load the compare register of a channel
///
/// Takes effect at the next compare when the channel is already running.
pub fn set_interval(channel: Channel, compare: u16) {
    critical_section::with(|cs| Active::set_compare(cs, channel, compare));
}

/// Whether the channel's counter is running
pub fn is_running(channel: Channel) -> bool {
    critical_section::with(|cs| Active::is_running(cs, channel))
}
