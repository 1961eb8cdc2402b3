//! GBA backend on top of the agb timer API
//!
//! agb hands out timers 2 and 3 through [`TimerController::timers`]; timers
//! 0 and 1 stay with its sound mixer. Channel 0 runs on timer 2 and channel 1
//! on timer 3, both with Divider1024 (16.384kHz at the 2^24Hz system clock,
//! ~61us per tick).
//!
//! ## Timer Registers (per timer n=2-3)
//! - `TM{n}CNT_L` (0x4000100 + n*4): Counter/Reload
//! - `TM{n}CNT_H` (0x4000102 + n*4): Control (prescaler, IRQ enable, start/stop)
//!
//! GBA timers count up from a reload value and interrupt on overflow, so a
//! compare value `c` becomes an overflow amount of `c + 1` ticks, the same
//! period a CTC timer produces.
//!
//! The timers must be handed over with [`init`] before any channel is used:
//!
//! ```rust,ignore
//! #[agb::entry]
//! fn main(mut gba: agb::Gba) -> ! {
//!     systimer::driver::gba::init(gba.timers.timers());
//!     // ...
//! }
//! ```
//!
//! Until then every register operation is a no-op.
//!
//! [`TimerController::timers`]: agb::timer::TimerController::timers

use core::cell::RefCell;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU8, Ordering};

use agb::interrupt::add_interrupt_handler;
use agb::timer::{Divider, Timer, Timers};

use super::Backend;
use crate::config::Channel;

#[cfg(feature = "channels-4")]
compile_error!("The `gba` backend has two timers available; use `channels-1` or `channels-2`");

/// Timers 2 and 3, once handed over by [`init`]
static TIMERS: Mutex<CriticalSectionRawMutex, RefCell<Option<[Timer; 2]>>> =
    Mutex::new(RefCell::new(None));

/// Bit per channel: interrupt handler installed
static HANDLERS: AtomicU8 = AtomicU8::new(0);

/// Bit per channel: timer enabled
static RUNNING: AtomicU8 = AtomicU8::new(0);

/// Take ownership of the agb timers backing the channels
///
/// Both timers are stopped and every channel starts from its reset state.
/// Calling this again replaces the stored timers.
pub fn init(timers: Timers<'_>) {
    let Timers { timer2, timer3, .. } = timers;
    critical_section::with(|cs| {
        let mut timers = [timer2, timer3];
        for timer in &mut timers {
            timer.set_interrupt(false).set_enabled(false);
        }
        TIMERS.borrow(cs).replace(Some(timers));
    });
    RUNNING.store(0, Ordering::Relaxed);
    debug!("gba timers 2 and 3 taken");
}

const fn channel_bit(channel: Channel) -> u8 {
    1 << channel.index()
}

fn with_timer<R>(
    cs: CriticalSection<'_>,
    channel: Channel,
    f: impl FnOnce(&mut Timer) -> R,
) -> Option<R> {
    let mut timers = TIMERS.borrow(cs).borrow_mut();
    match timers.as_mut() {
        Some(timers) => Some(f(&mut timers[channel.index()])),
        None => {
            warn!("gba timers used before systimer::driver::gba::init");
            None
        }
    }
}

fn install_handler(cs: CriticalSection<'_>, channel: Channel) {
    let bit = channel_bit(channel);
    if HANDLERS.load(Ordering::Relaxed) & bit != 0 {
        return;
    }
    let Some(interrupt) = with_timer(cs, channel, |timer| timer.interrupt()) else {
        return;
    };

    let handler = unsafe {
        add_interrupt_handler(interrupt, move |_| {
            crate::dispatch::on_interrupt(channel);
        })
    };
    // Handlers live for the rest of the program; the dispatch table decides
    // whether a fire reaches a timer
    core::mem::forget(handler);

    HANDLERS.fetch_or(bit, Ordering::Relaxed);
}

pub(crate) struct Gba;

impl Backend for Gba {
    fn stop(channel: Channel) {
        // The agb timers sit behind a critical-section mutex
        critical_section::with(|cs| {
            with_timer(cs, channel, |timer| {
                timer.set_enabled(false);
            });
        });
        RUNNING.fetch_and(!channel_bit(channel), Ordering::Relaxed);
    }

    fn enable_interrupt(cs: CriticalSection<'_>, channel: Channel) {
        install_handler(cs, channel);
        with_timer(cs, channel, |timer| {
            timer.set_interrupt(true);
        });
    }

    fn start(cs: CriticalSection<'_>, channel: Channel) {
        let started = with_timer(cs, channel, |timer| {
            timer.set_divider(Divider::Divider1024).set_enabled(true);
        });
        if started.is_some() {
            RUNNING.fetch_or(channel_bit(channel), Ordering::Relaxed);
        }
    }

    fn set_compare(cs: CriticalSection<'_>, channel: Channel, compare: u16) {
        with_timer(cs, channel, |timer| {
            timer.set_overflow_amount(compare.saturating_add(1));
        });
    }

    fn is_running(_cs: CriticalSection<'_>, channel: Channel) -> bool {
        RUNNING.load(Ordering::Relaxed) & channel_bit(channel) != 0
    }
}
