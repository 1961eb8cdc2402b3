//! Bit layout of an ATmega 16-bit Timer/Counter (TC1, TC3, TC4, TC5)
//!
//! Shared by the AVR backend and the host register model.

bitflags::bitflags! {
    /// `TCCRnB`: clock select and upper waveform generation bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlB: u8 {
        /// Clock select bit 0
        const CS0   = 1 << 0;
        /// Clock select bit 1
        const CS1   = 1 << 1;
        /// Clock select bit 2
        const CS2   = 1 << 2;
        /// Waveform generation mode bit 2 (CTC on OCRnA when alone)
        const WGM2  = 1 << 3;
        /// Waveform generation mode bit 3
        const WGM3  = 1 << 4;
        /// Input capture edge select
        const ICES  = 1 << 6;
        /// Input capture noise canceler
        const ICNC  = 1 << 7;

        /// Any clock source selected; the counter is running
        const CLOCK_SELECT = Self::CS0.bits() | Self::CS1.bits() | Self::CS2.bits();
        /// clk/1024 with clear-timer-on-compare against OCRnA
        const CTC_PRESCALE_1024 = Self::CS0.bits() | Self::CS2.bits() | Self::WGM2.bits();
    }
}

bitflags::bitflags! {
    /// `TIMSKn`: per-timer interrupt enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptMask: u8 {
        /// Overflow interrupt enable
        const TOIE  = 1 << 0;
        /// Output compare A match interrupt enable
        const OCIEA = 1 << 1;
        /// Output compare B match interrupt enable
        const OCIEB = 1 << 2;
        /// Output compare C match interrupt enable
        const OCIEC = 1 << 3;
        /// Input capture interrupt enable
        const ICIE  = 1 << 5;
    }
}
