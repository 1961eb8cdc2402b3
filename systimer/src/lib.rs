#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "avr", feature(abi_avr_interrupt))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Hardware timers with callbacks
//!
//! One API over the compare-match timers of several microcontroller
//! families: pick a channel, configure a period in milliseconds, choose
//! one-shot or repeating, attach a callback, arm.
//!
//! ## Layers
//!
//! - [`interval`]: period to comparator arithmetic, pure
//! - [`driver`]: per-channel register operations for the selected backend
//! - [`timer`]: the [`Timer`] object and its state machine
//! - [`dispatch`]: routes a channel's interrupt back to its armed [`Timer`]
//!
//! Nothing here allocates, and the interrupt path never logs.

// This must go first so the macros are visible to the other modules
#[macro_use]
mod fmt;

/// Channel count, clock, and prescaler
pub mod config;
pub use config::{CHANNEL_COUNT, CLOCK_HZ, Channel, ClockConfig, MAX_INTERVAL_MS, PRESCALER};

pub mod dispatch;
pub mod driver;
pub mod interval;
pub use interval::Interval;

mod error;
pub use error::TimerError;

pub mod timer;
pub use timer::{Callback, CallbackArg, Mode, Timer, TimerState};
