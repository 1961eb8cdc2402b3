/// Error type for timer operations
///
/// Interval problems are not errors: out-of-range periods are clamped and
/// the achieved period is returned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// Another timer is registered on this channel; disarm it first
    ChannelBusy,
    /// The timer has no interval yet; call `configure` before arming
    Unconfigured,
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimerError::ChannelBusy => write!(f, "Channel is owned by another timer"),
            TimerError::Unconfigured => write!(f, "Timer interval has not been configured"),
        }
    }
}
