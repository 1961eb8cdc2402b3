//! User-facing timer object
//!
//! # Example
//!
//! ```rust,ignore
//! use systimer::{CallbackArg, Channel, Mode, Timer};
//!
//! static BLINK: Timer = Timer::new(Channel::Ch0);
//!
//! fn toggle(arg: CallbackArg) {
//!     let led = arg.as_usize();
//!     // ...
//! }
//!
//! BLINK.configure(500, Mode::Repeating)?;
//! BLINK.set_callback(toggle, CallbackArg::from_usize(13));
//! BLINK.arm()?;
//! ```

use core::cell::Cell;
use core::ptr;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

use crate::config::{Channel, ClockConfig};
use crate::dispatch;
use crate::driver;
use crate::error::TimerError;
use crate::interval::Interval;

/// Function run from interrupt context each time a timer fires
///
/// Must be short and must not block.
pub type Callback = fn(CallbackArg);

/// Opaque, pointer-sized argument handed back to a [`Callback`]
///
/// The timer only stores and copies it. Whatever it refers to is owned by
/// the caller and must stay valid while the timer can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallbackArg(usize);

impl CallbackArg {
    /// Argument carrying no information
    pub const NONE: Self = Self(0);

    /// Wrap a plain value such as an index
    pub const fn from_usize(value: usize) -> Self {
        Self(value)
    }

    /// Wrap an address
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// The wrapped value
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// The wrapped value as an address
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }
}

impl From<usize> for CallbackArg {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// How a timer behaves when its compare match fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Configured but not dispatching: fires are ignored
    Idle = 0,
    /// Run the callback once, then disarm
    OneShot = 1,
    /// Run the callback on every fire until disarmed
    Repeating = 2,
}

impl Mode {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Mode::OneShot,
            2 => Mode::Repeating,
            _ => Mode::Idle,
        }
    }
}

/// Lifecycle of a [`Timer`]
///
/// `Unconfigured -> Configured -> Armed -> Disarmed`, with `Disarmed`
/// re-armable and both `Configured` and `Disarmed` reconfigurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TimerState {
    /// No interval set yet
    Unconfigured = 0,
    /// Interval programmed, counter stopped
    Configured = 1,
    /// Registered for its channel and counting
    Armed = 2,
    /// Stopped after having been armed
    Disarmed = 3,
}

impl TimerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => TimerState::Configured,
            2 => TimerState::Armed,
            3 => TimerState::Disarmed,
            _ => TimerState::Unconfigured,
        }
    }
}

/// A hardware timer channel with a callback
///
/// Timers are meant to live in `static` items: arming hands the dispatch
/// table a `&'static` reference that interrupt handlers use to find the
/// timer again.
pub struct Timer {
    channel: Channel,
    mode: AtomicU8,
    state: AtomicU8,
    /// 0 until configured
    period_ms: AtomicU32,
    handler: Mutex<CriticalSectionRawMutex, Cell<Option<(Callback, CallbackArg)>>>,
}

impl Timer {
    /// Create an unconfigured timer bound to `channel`
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            mode: AtomicU8::new(Mode::Idle as u8),
            state: AtomicU8::new(TimerState::Unconfigured as u8),
            period_ms: AtomicU32::new(0),
            handler: Mutex::new(Cell::new(None)),
        }
    }

    /// Channel this timer drives
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Current lifecycle state
    pub fn state(&self) -> TimerState {
        TimerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the timer is registered and counting
    pub fn is_armed(&self) -> bool {
        self.state() == TimerState::Armed
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    /// Achieved period in milliseconds, `None` before the first `configure`
    pub fn period_ms(&self) -> Option<u32> {
        match self.period_ms.load(Ordering::Relaxed) {
            0 => None,
            period_ms => Some(period_ms),
        }
    }

    /// Program the interval and mode without starting the counter
    ///
    /// Periods outside `[1, MAX_INTERVAL_MS]` are clamped; the period
    /// actually configured is returned. On an armed timer only the compare
    /// register is rewritten and the channel keeps counting, so the new
    /// period applies from the next compare.
    pub fn configure(&self, period_ms: u32, mode: Mode) -> Result<u32, TimerError> {
        let interval = Interval::from_period_ms(period_ms, &ClockConfig::ACTIVE);

        let result = critical_section::with(|cs| {
            if let Some(owner) = dispatch::owner(cs, self.channel) {
                if !ptr::eq(owner, self) {
                    return Err(TimerError::ChannelBusy);
                }
            }

            if self.is_armed() {
                driver::set_interval(self.channel, interval.compare);
            } else {
                driver::init(self.channel);
                driver::set_interval(self.channel, interval.compare);
                self.state
                    .store(TimerState::Configured as u8, Ordering::Release);
            }
            self.mode.store(mode as u8, Ordering::Relaxed);
            self.period_ms.store(interval.period_ms, Ordering::Relaxed);
            Ok(interval.period_ms)
        });

        match result {
            Ok(achieved) => {
                if interval.was_clamped(period_ms) {
                    debug!(
                        "{:?}: period {}ms clamped to {}ms",
                        self.channel,
                        period_ms,
                        achieved
                    );
                }
                trace!(
                    "{:?}: configured {:?} every {}ms (compare {})",
                    self.channel,
                    mode,
                    achieved,
                    interval.compare
                );
            }
            Err(_) => warn!("{:?}: configure refused, channel busy", self.channel),
        }
        result
    }

    /// Change the period, keeping the current mode
    pub fn set_interval(&self, period_ms: u32) -> Result<u32, TimerError> {
        self.configure(period_ms, self.mode())
    }

    /// Change the mode; applies from the next fire
    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    /// Attach the callback run on each fire
    ///
    /// A timer that fires with no callback attached does nothing.
    pub fn set_callback(&self, callback: Callback, arg: CallbackArg) {
        self.handler.lock(|handler| handler.set(Some((callback, arg))));
    }

    /// Detach the callback
    pub fn clear_callback(&self) {
        self.handler.lock(|handler| handler.set(None));
    }

    /// Register for the channel and start counting
    ///
    /// Arming an armed timer does nothing. Fails without touching the
    /// hardware when another timer owns the channel.
    pub fn arm(&'static self) -> Result<(), TimerError> {
        let result = critical_section::with(|cs| {
            if self.state() == TimerState::Unconfigured {
                return Err(TimerError::Unconfigured);
            }
            match dispatch::owner(cs, self.channel) {
                Some(owner) if ptr::eq(owner, self) => return Ok(()),
                Some(_) => return Err(TimerError::ChannelBusy),
                None => {}
            }

            // Another timer may have configured the channel since; reload ours
            let period_ms = self.period_ms.load(Ordering::Relaxed);
            let interval = Interval::from_period_ms(period_ms, &ClockConfig::ACTIVE);
            driver::init(self.channel);
            driver::set_interval(self.channel, interval.compare);

            dispatch::register(cs, self.channel, self);
            self.state.store(TimerState::Armed as u8, Ordering::Release);
            driver::start(self.channel);
            Ok(())
        });

        match result {
            Ok(()) => debug!("{:?}: armed", self.channel),
            Err(TimerError::ChannelBusy) => {
                warn!("{:?}: arm refused, channel owned by another timer", self.channel)
            }
            Err(TimerError::Unconfigured) => {
                warn!("{:?}: arm refused, timer not configured", self.channel)
            }
        }
        result
    }

    /// Stop counting and leave the dispatch table
    ///
    /// Safe to call repeatedly. A timer that is not the channel's registered
    /// owner leaves the owner's hardware alone.
    pub fn disarm(&self) {
        critical_section::with(|cs| {
            match dispatch::owner(cs, self.channel) {
                Some(owner) if !ptr::eq(owner, self) => {}
                _ => {
                    driver::stop(self.channel, true);
                    dispatch::unregister(cs, self.channel);
                }
            }
            if self.is_armed() {
                self.state
                    .store(TimerState::Disarmed as u8, Ordering::Release);
            }
        });
        trace!("{:?}: disarmed", self.channel);
    }

    /// Common compare-match handling, called from the interrupt vector
    ///
    /// One-shot timers disarm before the callback runs, so the callback may
    /// arm the timer again.
    pub(crate) fn on_compare_match(&self) {
        match self.mode() {
            Mode::Idle => return,
            Mode::OneShot => self.disarm_from_interrupt(),
            Mode::Repeating => {}
        }

        if let Some((callback, arg)) = self.handler.lock(|handler| handler.get()) {
            callback(arg);
        }
    }

    /// `disarm` without logging, for interrupt context
    fn disarm_from_interrupt(&self) {
        critical_section::with(|cs| {
            if dispatch::owner(cs, self.channel).is_some_and(|owner| ptr::eq(owner, self)) {
                driver::stop(self.channel, false);
                dispatch::unregister(cs, self.channel);
            }
            self.state
                .store(TimerState::Disarmed as u8, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::host;
    use crate::driver::regs::{ControlB, InterruptMask};
    use crate::test_support;
    use std::sync::atomic::{AtomicU32 as StdAtomicU32, Ordering as StdOrdering};

    fn count(arg: CallbackArg) {
        let counter = unsafe { &*arg.as_ptr::<StdAtomicU32>() };
        counter.fetch_add(1, StdOrdering::SeqCst);
    }

    fn counter_arg(counter: &'static StdAtomicU32) -> CallbackArg {
        CallbackArg::from_ptr(counter)
    }

    #[test]
    fn configure_programs_compare_without_starting() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        assert_eq!(TIMER.state(), TimerState::Unconfigured);
        assert_eq!(TIMER.period_ms(), None);

        assert_eq!(TIMER.configure(1, Mode::Repeating), Ok(1));

        let registers = host::registers(Channel::Ch0);
        assert_eq!(registers.compare, 14);
        assert!(registers.mask.contains(InterruptMask::OCIEA));
        assert!(!registers.is_running());
        assert_eq!(TIMER.state(), TimerState::Configured);
        assert_eq!(TIMER.period_ms(), Some(1));
        assert_eq!(TIMER.mode(), Mode::Repeating);
    }

    #[test]
    fn configure_reports_clamped_period() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        assert_eq!(TIMER.configure(0, Mode::OneShot), Ok(1));
        assert_eq!(
            TIMER.configure(u32::MAX, Mode::OneShot),
            Ok(crate::config::MAX_INTERVAL_MS)
        );
    }

    #[test]
    fn arm_requires_configure() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        assert_eq!(TIMER.arm(), Err(TimerError::Unconfigured));
        assert!(!dispatch::is_registered(Channel::Ch0));
        assert_eq!(host::registers(Channel::Ch0).starts, 0);
    }

    #[test]
    fn arm_registers_and_starts() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(100, Mode::Repeating).unwrap();
        TIMER.arm().unwrap();

        assert!(TIMER.is_armed());
        assert!(dispatch::is_registered(Channel::Ch0));
        let registers = host::registers(Channel::Ch0);
        assert_eq!(registers.control_b, ControlB::CTC_PRESCALE_1024);
        assert_eq!(registers.starts, 1);

        TIMER.disarm();
    }

    #[test]
    fn arming_twice_is_idempotent() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(10, Mode::Repeating).unwrap();
        TIMER.arm().unwrap();
        TIMER.arm().unwrap();

        assert_eq!(host::registers(Channel::Ch0).starts, 1);
        assert!(TIMER.is_armed());

        TIMER.disarm();
    }

    #[test]
    fn second_timer_cannot_take_an_owned_channel() {
        static OWNER: Timer = Timer::new(Channel::Ch0);
        static INTRUDER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        INTRUDER.configure(20, Mode::Repeating).unwrap();
        OWNER.configure(10, Mode::Repeating).unwrap();
        OWNER.arm().unwrap();
        let before = host::registers(Channel::Ch0);

        assert_eq!(INTRUDER.arm(), Err(TimerError::ChannelBusy));
        assert_eq!(
            INTRUDER.configure(30, Mode::OneShot),
            Err(TimerError::ChannelBusy)
        );
        // Disarming a non-owner leaves the owner counting
        INTRUDER.disarm();

        assert_eq!(host::registers(Channel::Ch0), before);
        assert!(OWNER.is_armed());
        assert!(!INTRUDER.is_armed());
        assert_eq!(OWNER.period_ms(), Some(10));

        OWNER.disarm();
        INTRUDER.arm().unwrap();
        assert!(INTRUDER.is_armed());
        // 20ms / 64us = 312.5 ticks
        assert_eq!(host::registers(Channel::Ch0).compare, 311);
        INTRUDER.disarm();
    }

    #[test]
    fn disarm_stops_and_unregisters() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(10, Mode::Repeating).unwrap();
        TIMER.arm().unwrap();
        TIMER.disarm();

        assert_eq!(TIMER.state(), TimerState::Disarmed);
        assert!(!dispatch::is_registered(Channel::Ch0));
        assert!(!host::registers(Channel::Ch0).is_running());

        TIMER.disarm();
        assert_eq!(TIMER.state(), TimerState::Disarmed);
    }

    #[test]
    fn disarm_before_arm_keeps_configured_state() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(10, Mode::OneShot).unwrap();
        TIMER.disarm();
        assert_eq!(TIMER.state(), TimerState::Configured);
    }

    #[test]
    fn one_shot_fires_once_per_arm() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        static FIRED: StdAtomicU32 = StdAtomicU32::new(0);
        let _guard = test_support::serial();

        TIMER.configure(5, Mode::OneShot).unwrap();
        TIMER.set_callback(count, counter_arg(&FIRED));
        TIMER.arm().unwrap();

        assert!(host::compare_match(Channel::Ch0));
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 1);
        assert_eq!(TIMER.state(), TimerState::Disarmed);
        assert!(!dispatch::is_registered(Channel::Ch0));

        // Counter stopped, and a stale vector entry finds nothing
        assert!(!host::compare_match(Channel::Ch0));
        host::raise_interrupt(Channel::Ch0);
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 1);

        TIMER.arm().unwrap();
        assert!(host::compare_match(Channel::Ch0));
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 2);
        assert_eq!(TIMER.mode(), Mode::OneShot);
    }

    #[test]
    fn repeating_fires_until_disarmed() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        static FIRED: StdAtomicU32 = StdAtomicU32::new(0);
        let _guard = test_support::serial();

        TIMER.configure(5, Mode::Repeating).unwrap();
        TIMER.set_callback(count, counter_arg(&FIRED));
        TIMER.arm().unwrap();

        for _ in 0..3 {
            assert!(host::compare_match(Channel::Ch0));
        }
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 3);
        assert!(TIMER.is_armed());

        TIMER.disarm();
        host::raise_interrupt(Channel::Ch0);
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 3);
    }

    #[test]
    fn missing_callback_is_skipped() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(5, Mode::Repeating).unwrap();
        TIMER.arm().unwrap();
        assert!(host::compare_match(Channel::Ch0));
        assert!(TIMER.is_armed());

        TIMER.disarm();
    }

    #[test]
    fn idle_mode_does_not_dispatch() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        static FIRED: StdAtomicU32 = StdAtomicU32::new(0);
        let _guard = test_support::serial();

        TIMER.configure(5, Mode::Idle).unwrap();
        TIMER.set_callback(count, counter_arg(&FIRED));
        TIMER.arm().unwrap();

        assert!(host::compare_match(Channel::Ch0));
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 0);
        assert!(TIMER.is_armed());

        TIMER.set_mode(Mode::Repeating);
        assert!(host::compare_match(Channel::Ch0));
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 1);

        TIMER.clear_callback();
        assert!(host::compare_match(Channel::Ch0));
        assert_eq!(FIRED.load(StdOrdering::SeqCst), 1);

        TIMER.disarm();
    }

    static REARMING: Timer = Timer::new(Channel::Ch0);
    static REARM_COUNT: StdAtomicU32 = StdAtomicU32::new(0);

    fn rearm(arg: CallbackArg) {
        let timer = unsafe { &*arg.as_ptr::<Timer>() };
        if REARM_COUNT.fetch_add(1, StdOrdering::SeqCst) == 0 {
            // Only the registered static can be re-armed
            if ptr::eq(timer, &REARMING) {
                REARMING.arm().unwrap();
            }
        }
    }

    #[test]
    fn one_shot_callback_can_rearm() {
        let _guard = test_support::serial();

        REARMING.configure(5, Mode::OneShot).unwrap();
        REARMING.set_callback(rearm, CallbackArg::from_ptr(&REARMING));
        REARMING.arm().unwrap();

        assert!(host::compare_match(Channel::Ch0));
        assert!(REARMING.is_armed());
        assert!(host::compare_match(Channel::Ch0));
        assert!(!REARMING.is_armed());
        assert_eq!(REARM_COUNT.load(StdOrdering::SeqCst), 2);
    }

    #[test]
    fn reconfigure_while_armed_keeps_counting() {
        static TIMER: Timer = Timer::new(Channel::Ch0);
        let _guard = test_support::serial();

        TIMER.configure(1, Mode::Repeating).unwrap();
        TIMER.arm().unwrap();
        assert_eq!(TIMER.set_interval(1000), Ok(1000));

        let registers = host::registers(Channel::Ch0);
        assert!(registers.is_running());
        assert_eq!(registers.compare, 15_624);
        assert_eq!(registers.starts, 1);
        assert!(TIMER.is_armed());
        assert_eq!(TIMER.mode(), Mode::Repeating);

        TIMER.disarm();
    }

    #[cfg(any(feature = "channels-2", feature = "channels-4"))]
    #[test]
    fn channels_dispatch_independently() {
        static FIRST: Timer = Timer::new(Channel::Ch0);
        static SECOND: Timer = Timer::new(Channel::Ch1);
        static FIRST_FIRED: StdAtomicU32 = StdAtomicU32::new(0);
        static SECOND_FIRED: StdAtomicU32 = StdAtomicU32::new(0);
        let _guard = test_support::serial();

        FIRST.configure(10, Mode::Repeating).unwrap();
        FIRST.set_callback(count, counter_arg(&FIRST_FIRED));
        SECOND.configure(20, Mode::OneShot).unwrap();
        SECOND.set_callback(count, counter_arg(&SECOND_FIRED));
        FIRST.arm().unwrap();
        SECOND.arm().unwrap();

        assert!(host::compare_match(Channel::Ch1));
        assert!(host::compare_match(Channel::Ch0));
        assert!(host::compare_match(Channel::Ch0));

        assert_eq!(FIRST_FIRED.load(StdOrdering::SeqCst), 2);
        assert_eq!(SECOND_FIRED.load(StdOrdering::SeqCst), 1);
        assert!(FIRST.is_armed());
        assert!(!SECOND.is_armed());

        FIRST.disarm();
    }

    #[test]
    fn callback_arg_round_trips() {
        assert_eq!(CallbackArg::from_usize(42).as_usize(), 42);
        assert_eq!(CallbackArg::from(7usize), CallbackArg::from_usize(7));
        assert_eq!(CallbackArg::default(), CallbackArg::NONE);
        let value = 5u8;
        let arg = CallbackArg::from_ptr(&value);
        assert_eq!(unsafe { *arg.as_ptr::<u8>() }, 5);
    }
}
