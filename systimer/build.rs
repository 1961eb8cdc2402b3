use std::env;
use std::fs;
use std::path::PathBuf;

use quote::quote;

/// Core clock of an Arduino Mega class ATmega2560 board
const AVR_DEFAULT_CLOCK_HZ: u32 = 16_000_000;

/// GBA system clock (2^24 Hz)
const GBA_DEFAULT_CLOCK_HZ: u32 = 16_777_216;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    let default_clock = if env::var_os("CARGO_FEATURE_GBA").is_some() {
        GBA_DEFAULT_CLOCK_HZ
    } else {
        AVR_DEFAULT_CLOCK_HZ
    };

    // SYSTIMER_CLOCK_HZ overrides the per-platform default, e.g. for 8MHz boards
    let clock_hz = match env::var("SYSTIMER_CLOCK_HZ") {
        Ok(value) => {
            let parsed = value
                .trim()
                .replace('_', "")
                .parse::<u32>()
                .unwrap_or_else(|_| panic!("SYSTIMER_CLOCK_HZ is not a valid u32: {value}"));
            if parsed == 0 {
                panic!("SYSTIMER_CLOCK_HZ must be non-zero");
            }
            println!("cargo:warning=Using SYSTIMER_CLOCK_HZ from environment: {parsed}");
            parsed
        }
        Err(_) => default_clock,
    };

    let generated = quote! {
        /// Timer input clock frequency in Hz, fixed at build time
        pub const CLOCK_HZ: u32 = #clock_hz;
    };

    fs::write(out_dir.join("_generated.rs"), generated.to_string())
        .expect("failed to write _generated.rs");

    println!("cargo:rerun-if-env-changed=SYSTIMER_CLOCK_HZ");
    println!("cargo:rerun-if-changed=build.rs");
}
