/// Reason a configuration change or commit was rejected.
///
/// All of these are local, recoverable failures: the [`Configuration`] is
/// left exactly as it was, and the caller can correct the request (use a
/// legal value, switch the chip mode first, finish specifying the
/// configuration) and try again.
///
/// [`Configuration`]: crate::Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The field is not usable in the chip's current interface mode.
    ///
    /// Several DRVCTRL fields only exist in step/dir mode, others only in
    /// SPI mode, and the CHOPCONF hysteresis and fast-decay fields swap
    /// meaning with the chopper mode. The relevant mode must have been
    /// explicitly set before any field that depends on it.
    InvalidMode,
    /// The value is outside the field's legal domain, or would violate a
    /// constraint against another field's current value.
    InvalidValue,
    /// Commit was attempted before every field had been explicitly set.
    InvalidConfig,
    /// No built-in motor profile carries the requested id.
    InvalidProfile,
}

/// Wrapper for problems when driving the TMC26x.
///
/// `TE` is the error type of the [`Transport`] in use.
///
/// [`Transport`]: crate::Transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TE> {
    /// The configuration rejected the request; nothing was transmitted.
    Config(ConfigError),
    /// The transport failed mid-transaction.
    ///
    /// Registers that had not yet been transmitted keep their dirty bits,
    /// so a retry resends only what is outstanding.
    Transport(TE),
}

#[doc(hidden)]
impl<TE> From<ConfigError> for Error<TE> {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
