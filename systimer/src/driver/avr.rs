//! ATmega2560 backend
//!
//! Channels map to the 16-bit Timer/Counters that Arduino leaves free:
//!
//! | channel | timer | vector         |
//! |---------|-------|----------------|
//! | 0       | TC1   | `TIMER1_COMPA` |
//! | 1       | TC3   | `TIMER3_COMPA` |
//! | 2       | TC4   | `TIMER4_COMPA` |
//! | 3       | TC5   | `TIMER5_COMPA` |
//!
//! The crate must be built with `#![feature(abi_avr_interrupt)]` available
//! (nightly) for the vectors below.

use avr_device::atmega2560::Peripherals;
use critical_section::CriticalSection;

use super::Backend;
use super::regs::{ControlB, InterruptMask};
use crate::config::Channel;

/// Expand `$body` once per channel with the matching timer's registers bound
///
/// The register types differ per timer, so the body is stamped out per arm
/// instead of going through a common trait.
macro_rules! with_registers {
    ($channel:expr, |$tccra:ident, $tccrb:ident, $ocra:ident, $timsk:ident| $body:expr) => {{
        // Register blocks are zero-sized handles; each channel only touches its own
        let dp = unsafe { Peripherals::steal() };
        match $channel {
            Channel::Ch0 => {
                let ($tccra, $tccrb, $ocra, $timsk) =
                    (&dp.TC1.tccr1a, &dp.TC1.tccr1b, &dp.TC1.ocr1a, &dp.TC1.timsk1);
                $body
            }
            #[cfg(any(feature = "channels-2", feature = "channels-4"))]
            Channel::Ch1 => {
                let ($tccra, $tccrb, $ocra, $timsk) =
                    (&dp.TC3.tccr3a, &dp.TC3.tccr3b, &dp.TC3.ocr3a, &dp.TC3.timsk3);
                $body
            }
            #[cfg(feature = "channels-4")]
            Channel::Ch2 => {
                let ($tccra, $tccrb, $ocra, $timsk) =
                    (&dp.TC4.tccr4a, &dp.TC4.tccr4b, &dp.TC4.ocr4a, &dp.TC4.timsk4);
                $body
            }
            #[cfg(feature = "channels-4")]
            Channel::Ch3 => {
                let ($tccra, $tccrb, $ocra, $timsk) =
                    (&dp.TC5.tccr5a, &dp.TC5.tccr5b, &dp.TC5.ocr5a, &dp.TC5.timsk5);
                $body
            }
        }
    }};
}

pub(crate) struct Avr;

impl Backend for Avr {
    fn stop(channel: Channel) {
        with_registers!(channel, |tccra, tccrb, _ocra, _timsk| {
            // Clearing the CS bits in B stops the counter; A is cleared as well
            // so no waveform mode lingers
            tccra.write(|w| unsafe { w.bits(0) });
            tccrb.write(|w| unsafe { w.bits(0) });
        })
    }

    fn enable_interrupt(_cs: CriticalSection<'_>, channel: Channel) {
        with_registers!(channel, |_tccra, _tccrb, _ocra, timsk| {
            timsk.modify(|r, w| unsafe { w.bits(r.bits() | InterruptMask::OCIEA.bits()) });
        })
    }

    fn start(_cs: CriticalSection<'_>, channel: Channel) {
        with_registers!(channel, |_tccra, tccrb, _ocra, _timsk| {
            tccrb.modify(|r, w| unsafe { w.bits(r.bits() | ControlB::CTC_PRESCALE_1024.bits()) });
        })
    }

    fn set_compare(_cs: CriticalSection<'_>, channel: Channel, compare: u16) {
        // 16-bit access goes through the shared TEMP register, hence the
        // critical section held by the caller
        with_registers!(channel, |_tccra, _tccrb, ocra, _timsk| {
            ocra.write(|w| unsafe { w.bits(compare) });
        })
    }

    fn is_running(_cs: CriticalSection<'_>, channel: Channel) -> bool {
        with_registers!(channel, |_tccra, tccrb, _ocra, _timsk| {
            ControlB::from_bits_truncate(tccrb.read().bits()).intersects(ControlB::CLOCK_SELECT)
        })
    }
}

#[avr_device::interrupt(atmega2560)]
fn TIMER1_COMPA() {
    crate::dispatch::on_interrupt(Channel::Ch0);
}

#[cfg(any(feature = "channels-2", feature = "channels-4"))]
#[avr_device::interrupt(atmega2560)]
fn TIMER3_COMPA() {
    crate::dispatch::on_interrupt(Channel::Ch1);
}

#[cfg(feature = "channels-4")]
#[avr_device::interrupt(atmega2560)]
fn TIMER4_COMPA() {
    crate::dispatch::on_interrupt(Channel::Ch2);
}

#[cfg(feature = "channels-4")]
#[avr_device::interrupt(atmega2560)]
fn TIMER5_COMPA() {
    crate::dispatch::on_interrupt(Channel::Ch3);
}
