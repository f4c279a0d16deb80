//! The TMC26x register set and the bookkeeping masks over it.

/// The five write-only 20-bit configuration registers.
///
/// Each register datagram carries its address in the top bits (3 bits for
/// DRVCONF/SGCSCONF/SMARTEN/CHOPCONF, effectively 1 for DRVCTRL), so the
/// address prefix is baked into the register value itself and must never
/// be disturbed by a field write.
///
/// # Datasheet
///
/// See section 6 of the TMC260/TMC261 datasheet (Rev. 2.05 / 2012-NOV-05)
/// for the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Driver control: microstepping or direct coil control, depending on
    /// the interface mode.
    DrvCtrl,
    /// Chopper configuration.
    ChopConf,
    /// coolStep smart energy control.
    SmartEn,
    /// stallGuard threshold and current scale.
    SgcsConf,
    /// Driver configuration: interface mode, sense voltage, readback
    /// select, slope control and short protection.
    DrvConf,
}

impl Register {
    /// The register value with the address prefix and all data bits zero.
    pub(crate) const fn address(self) -> u32 {
        match self {
            Register::DrvCtrl => 0x00000,
            Register::ChopConf => 0x80000,
            Register::SmartEn => 0xA0000,
            Register::SgcsConf => 0xC0000,
            Register::DrvConf => 0xE0000,
        }
    }

    /// This register's bit in the dirty mask.
    pub(crate) const fn dirty_mask(self) -> u8 {
        match self {
            Register::DrvCtrl => 1 << 0,
            Register::ChopConf => 1 << 1,
            Register::SmartEn => 1 << 2,
            Register::SgcsConf => 1 << 3,
            Register::DrvConf => 1 << 4,
        }
    }
}

/// All five registers pending transmission, the state right after
/// initialisation.
pub(crate) const DIRTY_ALL: u8 = Register::DrvCtrl.dirty_mask()
    | Register::ChopConf.dirty_mask()
    | Register::SmartEn.dirty_mask()
    | Register::SgcsConf.dirty_mask()
    | Register::DrvConf.dirty_mask();

/// Telemetry channel selectable through the DRVCONF readback-select field.
///
/// The chip's reply to every register write carries the value of whichever
/// channel was selected at the time of the *previous* write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadbackChannel {
    /// Microstep position in the sine table.
    MicroStep,
    /// stallGuard load measurement.
    StallGuard,
    /// coolStep scaling value (and the upper stallGuard bits).
    CoolStep,
}

impl ReadbackChannel {
    /// Encoding of the readback-select field (DRVCONF bits 4..=5).
    pub(crate) const fn code(self) -> u32 {
        match self {
            ReadbackChannel::MicroStep => 0,
            ReadbackChannel::StallGuard => 1,
            ReadbackChannel::CoolStep => 2,
        }
    }

    pub(crate) const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ReadbackChannel::MicroStep),
            1 => Some(ReadbackChannel::StallGuard),
            2 => Some(ReadbackChannel::CoolStep),
            _ => None,
        }
    }
}

/// One validity bit per logical field.
///
/// The bit assignments follow the register layout, with one twist: DRVCTRL
/// means different things in step/dir and SPI mode, so its two field sets
/// share validity bits 0..=3. A drive-mode change invalidates whichever
/// interpretation is being left behind.
pub(crate) mod valid {
    // DRVCTRL, step/dir interface.
    pub(crate) const STEP_INTERPOLATION: u32 = 1 << 0;
    pub(crate) const DOUBLE_EDGE: u32 = 1 << 1;
    pub(crate) const MICROSTEP_RESOLUTION: u32 = 1 << 2;
    /// DRVCTRL bit 3 has no field in step/dir mode; its validity slot is
    /// pre-asserted so a fully-specified step/dir configuration can reach
    /// full validity.
    pub(crate) const DRVCTRL_BIT3: u32 = 1 << 3;

    // DRVCTRL, SPI interface (same storage, different meaning).
    pub(crate) const POLARITY_A: u32 = 1 << 0;
    pub(crate) const POLARITY_B: u32 = 1 << 1;
    pub(crate) const CURRENT_A: u32 = 1 << 2;
    pub(crate) const CURRENT_B: u32 = 1 << 3;

    // CHOPCONF.
    pub(crate) const BLANKING_TIME: u32 = 1 << 4;
    pub(crate) const CHOPPER_MODE: u32 = 1 << 5;
    pub(crate) const RANDOM_T_OFF: u32 = 1 << 6;
    pub(crate) const OFF_TIME: u32 = 1 << 7;

    // CHOPCONF bits 4..=12, spreadCycle interpretation.
    pub(crate) const HYSTERESIS_DECREMENT: u32 = 1 << 8;
    pub(crate) const HYSTERESIS_START: u32 = 1 << 9;
    pub(crate) const HYSTERESIS_END: u32 = 1 << 10;

    // CHOPCONF bits 4..=12, fast-decay interpretation (same storage).
    pub(crate) const FAST_DECAY_MODE: u32 = 1 << 8;
    pub(crate) const SINE_OFFSET: u32 = 1 << 9;
    pub(crate) const FAST_DECAY_TIME: u32 = 1 << 10;

    // SMARTEN.
    pub(crate) const COOL_STEP_CURRENT_FLOOR: u32 = 1 << 11;
    pub(crate) const CURRENT_DECREMENT_SPEED: u32 = 1 << 12;
    pub(crate) const UPPER_COOL_STEP_THRESHOLD: u32 = 1 << 13;
    pub(crate) const CURRENT_INCREMENT_SIZE: u32 = 1 << 14;
    pub(crate) const LOWER_COOL_STEP_THRESHOLD: u32 = 1 << 15;

    // SGCSCONF.
    pub(crate) const STALL_GUARD_FILTER: u32 = 1 << 16;
    pub(crate) const STALL_GUARD_THRESHOLD: u32 = 1 << 17;
    pub(crate) const CURRENT_SCALE: u32 = 1 << 18;

    // DRVCONF.
    pub(crate) const TEST_MODE: u32 = 1 << 19;
    pub(crate) const SLOPE_CONTROL_HIGH: u32 = 1 << 20;
    pub(crate) const SLOPE_CONTROL_LOW: u32 = 1 << 21;
    pub(crate) const GROUND_SHORT_PROTECTION: u32 = 1 << 22;
    pub(crate) const GROUND_SHORT_TIMER: u32 = 1 << 23;
    pub(crate) const DRIVE_MODE: u32 = 1 << 24;
    pub(crate) const SENSE_VOLTAGE: u32 = 1 << 25;
    pub(crate) const READBACK_CHANNEL: u32 = 1 << 26;

    /// First bit past the last field; everything from here up is the
    /// initialisation sentinel.
    pub(crate) const END: u32 = 1 << 27;

    /// Set only by [`Configuration::new`]; commit refuses to run without
    /// it. A configuration is legal for transmission once every field bit
    /// below [`END`] is also set.
    ///
    /// [`Configuration::new`]: crate::Configuration::new
    pub(crate) const SENTINEL: u32 = !(END - 1);

    /// Validity straight out of the initialiser.
    pub(crate) const INITIAL: u32 = SENTINEL | DRVCTRL_BIT3;
}

/// Data-bit positions that more than one module needs to inspect.
pub(crate) mod field {
    /// DRVCONF bit 7: 0 = step/dir interface, 1 = SPI interface.
    pub(crate) const DRIVE_MODE_BIT: usize = 7;
    /// DRVCONF bit 6: 0 = 305 mV full-scale sense voltage, 1 = 165 mV.
    pub(crate) const SENSE_VOLTAGE_BIT: usize = 6;
    /// DRVCONF bits 4..=5: readback channel select.
    pub(crate) const READBACK_POS: usize = 4;
    pub(crate) const READBACK_WIDTH: usize = 2;
    /// CHOPCONF bit 14: 0 = spreadCycle, 1 = constant off-time fast decay.
    pub(crate) const CHOPPER_MODE_BIT: usize = 14;
}
