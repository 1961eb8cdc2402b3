//! Channel to timer dispatch
//!
//! Interrupt vectors cannot carry a `self`, so armed timers register here and
//! the per-channel vector looks its timer up by channel index. Entries are
//! borrowed `&'static` references; the table never owns a timer.
//!
//! All entries start empty, are set by [`Timer::arm`] and cleared by
//! [`Timer::disarm`], always inside a critical section.

use core::cell::Cell;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::config::{CHANNEL_COUNT, Channel};
use crate::timer::Timer;

static TABLE: Mutex<CriticalSectionRawMutex, [Cell<Option<&'static Timer>>; CHANNEL_COUNT]> =
    Mutex::new([const { Cell::new(None) }; CHANNEL_COUNT]);

/// Timer currently registered on `channel`
pub(crate) fn owner(cs: CriticalSection<'_>, channel: Channel) -> Option<&'static Timer> {
    TABLE.borrow(cs)[channel.index()].get()
}

pub(crate) fn register(cs: CriticalSection<'_>, channel: Channel, timer: &'static Timer) {
    TABLE.borrow(cs)[channel.index()].set(Some(timer));
}

pub(crate) fn unregister(cs: CriticalSection<'_>, channel: Channel) {
    TABLE.borrow(cs)[channel.index()].set(None);
}

/// Whether any timer is registered on `channel`
pub fn is_registered(channel: Channel) -> bool {
    critical_section::with(|cs| owner(cs, channel).is_some())
}

/// Shared body of every timer compare-match vector
///
/// Runs in interrupt context. A channel with no registered timer is a stale
/// or spurious interrupt and is ignored.
pub fn on_interrupt(channel: Channel) {
    let timer = critical_section::with(|cs| owner(cs, channel));
    if let Some(timer) = timer {
        timer.on_compare_match();
    }
}

/// Empty every entry without touching the timers that held them
///
/// Only exists on the host backend, where tests start each case from a
/// clean table. A timer left registered here keeps believing it is armed.
#[cfg(not(any(feature = "avr", feature = "gba")))]
pub fn reset() {
    critical_section::with(|cs| {
        for entry in TABLE.borrow(cs).iter() {
            entry.set(None);
        }
    });
}
