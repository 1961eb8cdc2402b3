//! In-memory register model used when no hardware backend is enabled
//!
//! Each channel gets the control, mask and compare registers of an ATmega
//! 16-bit timer with the same bit layout, so host builds exercise the exact
//! bit-field selection the AVR backend performs. [`compare_match`] stands in
//! for the hardware raising the compare interrupt.

use core::cell::Cell;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::Backend;
use super::regs::{ControlB, InterruptMask};
use crate::config::{CHANNEL_COUNT, Channel};

/// Register contents of one simulated timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// `TCCRnA`
    pub control_a: u8,
    /// `TCCRnB`
    pub control_b: ControlB,
    /// `TIMSKn`
    pub mask: InterruptMask,
    /// `OCRnA`
    pub compare: u16,
    /// Number of start operations issued to this channel
    pub starts: u32,
}

impl Registers {
    const RESET: Self = Self {
        control_a: 0,
        control_b: ControlB::empty(),
        mask: InterruptMask::empty(),
        compare: 0,
        starts: 0,
    };

    /// Whether a clock source is selected
    pub fn is_running(&self) -> bool {
        self.control_b.intersects(ControlB::CLOCK_SELECT)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::RESET
    }
}

static REGISTERS: Mutex<CriticalSectionRawMutex, [Cell<Registers>; CHANNEL_COUNT]> =
    Mutex::new([const { Cell::new(Registers::RESET) }; CHANNEL_COUNT]);

fn update(cs: CriticalSection<'_>, channel: Channel, f: impl FnOnce(&mut Registers)) {
    let cell = &REGISTERS.borrow(cs)[channel.index()];
    let mut registers = cell.get();
    f(&mut registers);
    cell.set(registers);
}

/// Snapshot of a channel's registers
pub fn registers(channel: Channel) -> Registers {
    critical_section::with(|cs| REGISTERS.borrow(cs)[channel.index()].get())
}

/// Put every channel back to its power-on register state
pub fn reset() {
    critical_section::with(|cs| {
        for cell in REGISTERS.borrow(cs).iter() {
            cell.set(Registers::RESET);
        }
    });
}

/// Simulate the counter reaching the compare value
///
/// Raises the interrupt only when the channel is counting and its
/// compare-match interrupt is enabled, as the hardware would. Returns
/// whether the interrupt was raised.
pub fn compare_match(channel: Channel) -> bool {
    let raised = critical_section::with(|cs| {
        let registers = REGISTERS.borrow(cs)[channel.index()].get();
        registers.is_running() && registers.mask.contains(InterruptMask::OCIEA)
    });
    if raised {
        raise_interrupt(channel);
    }
    raised
}

/// Enter the interrupt vector for a channel regardless of register state
///
/// Models a spurious or stale interrupt.
pub fn raise_interrupt(channel: Channel) {
    // Vectors run with interrupts masked
    critical_section::with(|_| crate::dispatch::on_interrupt(channel));
}

pub(crate) struct Host;

impl Backend for Host {
    fn stop(channel: Channel) {
        // Two plain stores, no read-modify-write
        critical_section::with(|cs| {
            update(cs, channel, |r| {
                r.control_a = 0;
                r.control_b = ControlB::empty();
            });
        });
    }

    fn enable_interrupt(cs: CriticalSection<'_>, channel: Channel) {
        update(cs, channel, |r| r.mask |= InterruptMask::OCIEA);
    }

    fn start(cs: CriticalSection<'_>, channel: Channel) {
        update(cs, channel, |r| {
            r.control_b |= ControlB::CTC_PRESCALE_1024;
            r.starts += 1;
        });
    }

    fn set_compare(cs: CriticalSection<'_>, channel: Channel, compare: u16) {
        update(cs, channel, |r| r.compare = compare);
    }

    fn is_running(cs: CriticalSection<'_>, channel: Channel) -> bool {
        REGISTERS.borrow(cs)[channel.index()].get().is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver;
    use crate::test_support;

    #[test]
    fn init_enables_interrupt_but_leaves_channel_stopped() {
        let _guard = test_support::serial();

        driver::start(Channel::Ch0);
        driver::init(Channel::Ch0);

        let r = registers(Channel::Ch0);
        assert!(!r.is_running());
        assert!(r.mask.contains(InterruptMask::OCIEA));
        assert_eq!(r.control_a, 0);
    }

    #[test]
    fn start_selects_ctc_and_prescale_1024() {
        let _guard = test_support::serial();

        driver::init(Channel::Ch0);
        driver::set_interval(Channel::Ch0, 14);
        driver::start(Channel::Ch0);

        let r = registers(Channel::Ch0);
        assert_eq!(r.control_b, ControlB::CTC_PRESCALE_1024);
        assert_eq!(r.compare, 14);
        assert!(driver::is_running(Channel::Ch0));
    }

    #[test]
    fn stop_is_idempotent() {
        let _guard = test_support::serial();

        driver::init(Channel::Ch0);
        driver::start(Channel::Ch0);
        driver::stop(Channel::Ch0, true);
        let once = registers(Channel::Ch0);
        driver::stop(Channel::Ch0, true);
        driver::stop(Channel::Ch0, false);

        assert_eq!(registers(Channel::Ch0), once);
        assert!(!once.is_running());
        // The interrupt enable survives a stop
        assert!(once.mask.contains(InterruptMask::OCIEA));
    }

    #[test]
    fn set_interval_while_running_keeps_counting() {
        let _guard = test_support::serial();

        driver::init(Channel::Ch0);
        driver::start(Channel::Ch0);
        driver::set_interval(Channel::Ch0, 1000);

        let r = registers(Channel::Ch0);
        assert!(r.is_running());
        assert_eq!(r.compare, 1000);
    }

    #[test]
    fn compare_match_needs_clock_and_mask() {
        let _guard = test_support::serial();

        assert!(!compare_match(Channel::Ch0));
        driver::init(Channel::Ch0);
        assert!(!compare_match(Channel::Ch0));
        driver::start(Channel::Ch0);
        assert!(compare_match(Channel::Ch0));
    }

    #[cfg(any(feature = "channels-2", feature = "channels-4"))]
    #[test]
    fn channels_are_independent() {
        let _guard = test_support::serial();

        driver::init(Channel::Ch0);
        driver::start(Channel::Ch0);
        driver::set_interval(Channel::Ch1, 77);

        let other = registers(Channel::Ch1);
        assert!(!other.is_running());
        assert_eq!(other.compare, 77);
        assert!(other.mask.is_empty());
    }
}
