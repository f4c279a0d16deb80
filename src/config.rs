//! The in-memory mirror of the chip's configuration registers.

use crate::bits::{get_field, set_field};
use crate::current::SenseVoltage;
use crate::error::ConfigError;
use crate::registers::{DIRTY_ALL, ReadbackChannel, Register, field, valid};

/// Interface mode of the chip (DRVCONF SDOFF bit).
///
/// In step/dir mode the motor is driven by the STEP and DIR pins and
/// DRVCTRL carries microstepping settings. In SPI mode the coil currents
/// are written directly over SPI and DRVCTRL carries the polarity and
/// magnitude of both coils. The same DRVCTRL bits mean different things in
/// each mode, so every mode-sensitive setter checks this field first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    /// STEP and DIR pin interface.
    StepDir,
    /// Direct coil control over SPI.
    Spi,
}

impl DriveMode {
    const fn bit(self) -> u32 {
        match self {
            DriveMode::StepDir => 0,
            DriveMode::Spi => 1,
        }
    }
}

/// Chopper mode (CHOPCONF CHM bit).
///
/// Selects how CHOPCONF bits 4..=12 are interpreted: hysteresis settings
/// in spreadCycle mode, fast-decay settings in constant off-time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChopperMode {
    /// Standard spreadCycle mode.
    SpreadCycle,
    /// Constant off-time mode with fast decay.
    FastDecay,
}

impl ChopperMode {
    const fn bit(self) -> u32 {
        match self {
            ChopperMode::SpreadCycle => 0,
            ChopperMode::FastDecay => 1,
        }
    }
}

/// MOSFET slope control setting (DRVCONF SLPH/SLPL fields).
///
/// The high side accepts minimum, the two temperature-compensated
/// variants, and maximum; the low side accepts minimum, medium and
/// maximum. Passing a variant to the wrong side fails with
/// [`ConfigError::InvalidValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlopeControl {
    /// Minimum slope.
    Minimum,
    /// Minimum slope with temperature compensation (high side only).
    MinimumTemperatureCompensation,
    /// Medium slope with temperature compensation (high side only).
    MediumTemperatureCompensation,
    /// Medium slope (low side only).
    Medium,
    /// Maximum slope.
    Maximum,
}

impl SlopeControl {
    fn high_side_code(self) -> Option<u32> {
        match self {
            SlopeControl::Minimum => Some(0),
            SlopeControl::MinimumTemperatureCompensation => Some(1),
            SlopeControl::MediumTemperatureCompensation => Some(2),
            SlopeControl::Maximum => Some(3),
            SlopeControl::Medium => None,
        }
    }

    fn low_side_code(self) -> Option<u32> {
        match self {
            SlopeControl::Minimum => Some(0),
            SlopeControl::Medium => Some(2),
            SlopeControl::Maximum => Some(3),
            SlopeControl::MinimumTemperatureCompensation
            | SlopeControl::MediumTemperatureCompensation => None,
        }
    }
}

/// Lower bound coolStep may scale the motor current down to (SMARTEN SEIMIN
/// bit), as a fraction of the current-scale setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoolStepCurrentFloor {
    /// One half of the current-scale setting.
    Half,
    /// One quarter of the current-scale setting.
    Quarter,
}

impl CoolStepCurrentFloor {
    const fn bit(self) -> u32 {
        match self {
            CoolStepCurrentFloor::Half => 0,
            CoolStepCurrentFloor::Quarter => 1,
        }
    }
}

/// In-memory mirror of the five write-only configuration registers.
///
/// The chip offers no way to read its configuration back, so this mirror
/// is the authoritative record of what the chip has been (or will be)
/// told. Two bitmasks track its lifecycle:
///
/// - *validity* — one bit per logical field, set once the field has been
///   explicitly set. Fields whose legality depends on another field (the
///   interface mode, the chopper mode, the other hysteresis bound) check
///   the dependency's validity bit instead of trusting a power-on default.
/// - *dirty* — one bit per register, set when a field write makes the
///   local value diverge from the chip, cleared as the register is
///   transmitted by [`Tmc26x::commit`].
///
/// A failed setter leaves the configuration byte-for-byte unchanged: every
/// check runs before the first bit is written.
///
/// [`Tmc26x::commit`]: crate::Tmc26x::commit
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Configuration {
    drvctrl: u32,
    chopconf: u32,
    smarten: u32,
    sgcsconf: u32,
    drvconf: u32,
    validity: u32,
    dirty: u8,
    driving_current: u16,
    stationary_current: u16,
}

impl Configuration {
    /// Fresh configuration: every register holds only its address prefix,
    /// all five registers are pending transmission, and no field is valid
    /// yet.
    pub fn new() -> Self {
        Self {
            drvctrl: Register::DrvCtrl.address(),
            chopconf: Register::ChopConf.address(),
            smarten: Register::SmartEn.address(),
            sgcsconf: Register::SgcsConf.address(),
            drvconf: Register::DrvConf.address(),
            validity: valid::INITIAL,
            dirty: DIRTY_ALL,
            driving_current: 0,
            stationary_current: 0,
        }
    }

    ////////////////////////////////////////////////////////////////////////////////
    // State queries
    ////////////////////////////////////////////////////////////////////////////////

    /// The current 20-bit value of a register, address prefix included.
    pub fn register(&self, register: Register) -> u32 {
        match register {
            Register::DrvCtrl => self.drvctrl,
            Register::ChopConf => self.chopconf,
            Register::SmartEn => self.smarten,
            Register::SgcsConf => self.sgcsconf,
            Register::DrvConf => self.drvconf,
        }
    }

    /// True if any register has changes not yet sent to the chip.
    pub fn is_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// True if this register has changes not yet sent to the chip.
    pub fn is_register_dirty(&self, register: Register) -> bool {
        self.dirty & register.dirty_mask() != 0
    }

    /// True once every logical field has been explicitly set.
    ///
    /// [`Tmc26x::commit`] refuses to transmit anything less: the chip's
    /// registers are write-only, so transmitting a half-specified mirror
    /// would overwrite unknown chip state with unintended zeroes.
    ///
    /// [`Tmc26x::commit`]: crate::Tmc26x::commit
    pub fn is_fully_specified(&self) -> bool {
        self.validity == u32::MAX
    }

    /// The interface mode, if it has been explicitly set.
    pub fn drive_mode(&self) -> Option<DriveMode> {
        if self.validity & valid::DRIVE_MODE == 0 {
            return None;
        }
        Some(
            if get_field(self.drvconf, field::DRIVE_MODE_BIT, 1) == 1 {
                DriveMode::Spi
            } else {
                DriveMode::StepDir
            },
        )
    }

    /// The chopper mode, if it has been explicitly set.
    pub fn chopper_mode(&self) -> Option<ChopperMode> {
        if self.validity & valid::CHOPPER_MODE == 0 {
            return None;
        }
        Some(
            if get_field(self.chopconf, field::CHOPPER_MODE_BIT, 1) == 1 {
                ChopperMode::FastDecay
            } else {
                ChopperMode::SpreadCycle
            },
        )
    }

    /// The full-scale sense voltage, if it has been explicitly set.
    pub fn sense_voltage(&self) -> Option<SenseVoltage> {
        if self.validity & valid::SENSE_VOLTAGE == 0 {
            return None;
        }
        Some(SenseVoltage::from_bit(get_field(
            self.drvconf,
            field::SENSE_VOLTAGE_BIT,
            1,
        )))
    }

    /// The telemetry channel DRVCONF currently selects for readback, if it
    /// has been explicitly set.
    pub fn readback_channel(&self) -> Option<ReadbackChannel> {
        if self.validity & valid::READBACK_CHANNEL == 0 {
            return None;
        }
        ReadbackChannel::from_code(get_field(
            self.drvconf,
            field::READBACK_POS,
            field::READBACK_WIDTH,
        ))
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Stored current targets
    ////////////////////////////////////////////////////////////////////////////////

    /// Record the current target to use while the motor is moving, in mA.
    ///
    /// Only stored for later use by [`Tmc26x::apply_driving_current`]; no
    /// register changes until then.
    ///
    /// [`Tmc26x::apply_driving_current`]: crate::Tmc26x::apply_driving_current
    pub fn set_driving_current(&mut self, current_ma: u16) {
        self.driving_current = current_ma;
    }

    /// The stored driving-current target in mA.
    pub fn driving_current(&self) -> u16 {
        self.driving_current
    }

    /// Record the current target to use while the motor holds position,
    /// in mA.
    ///
    /// Only stored for later use by [`Tmc26x::apply_stationary_current`].
    ///
    /// [`Tmc26x::apply_stationary_current`]: crate::Tmc26x::apply_stationary_current
    pub fn set_stationary_current(&mut self, current_ma: u16) {
        self.stationary_current = current_ma;
    }

    /// The stored stationary-current target in mA.
    pub fn stationary_current(&self) -> u16 {
        self.stationary_current
    }

    ////////////////////////////////////////////////////////////////////////////////
    // DRVCTRL, step/dir interface
    ////////////////////////////////////////////////////////////////////////////////

    /// Enable STEP pulse interpolation (DRVCTRL bit 9, step/dir mode).
    ///
    /// When enabled, each STEP edge is multiplied into 16 microsteps.
    pub fn set_step_interpolation(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::StepDir)?;
        self.update(
            Register::DrvCtrl,
            9,
            1,
            enabled as u32,
            valid::STEP_INTERPOLATION,
        );
        Ok(())
    }

    /// Make both STEP pulse edges active (DRVCTRL bit 8, step/dir mode).
    pub fn set_double_edge(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::StepDir)?;
        self.update(Register::DrvCtrl, 8, 1, enabled as u32, valid::DOUBLE_EDGE);
        Ok(())
    }

    /// Set the microstep resolution (DRVCTRL bits 0..=3, step/dir mode).
    ///
    /// `microsteps` is the number of microsteps per full step and must be
    /// a power of two in 1..=256; anything else fails with
    /// [`ConfigError::InvalidValue`].
    pub fn set_microstep_resolution(&mut self, microsteps: u16) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::StepDir)?;
        let code = match microsteps {
            256 => 0,
            128 => 1,
            64 => 2,
            32 => 3,
            16 => 4,
            8 => 5,
            4 => 6,
            2 => 7,
            1 => 8,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(Register::DrvCtrl, 0, 4, code, valid::MICROSTEP_RESOLUTION);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // DRVCTRL, SPI interface
    ////////////////////////////////////////////////////////////////////////////////

    /// Reverse the current flow through coil A (DRVCTRL bit 17, SPI mode).
    pub fn set_polarity_a(&mut self, reversed: bool) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::Spi)?;
        self.update(Register::DrvCtrl, 17, 1, reversed as u32, valid::POLARITY_A);
        Ok(())
    }

    /// Reverse the current flow through coil B (DRVCTRL bit 8, SPI mode).
    pub fn set_polarity_b(&mut self, reversed: bool) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::Spi)?;
        self.update(Register::DrvCtrl, 8, 1, reversed as u32, valid::POLARITY_B);
        Ok(())
    }

    /// Magnitude of the current through coil A (DRVCTRL bits 9..=16,
    /// SPI mode).
    pub fn set_current_a(&mut self, magnitude: u8) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::Spi)?;
        self.update(
            Register::DrvCtrl,
            9,
            8,
            u32::from(magnitude),
            valid::CURRENT_A,
        );
        Ok(())
    }

    /// Magnitude of the current through coil B (DRVCTRL bits 0..=7,
    /// SPI mode).
    pub fn set_current_b(&mut self, magnitude: u8) -> Result<(), ConfigError> {
        self.require_drive_mode(DriveMode::Spi)?;
        self.update(
            Register::DrvCtrl,
            0,
            8,
            u32::from(magnitude),
            valid::CURRENT_B,
        );
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // CHOPCONF
    ////////////////////////////////////////////////////////////////////////////////

    /// Select the chopper mode (CHOPCONF bit 14).
    ///
    /// CHOPCONF bits 4..=12 change meaning with the chopper mode, so they
    /// are zeroed and their validity dropped; the hysteresis or fast-decay
    /// settings must be set again afterwards.
    pub fn set_chopper_mode(&mut self, mode: ChopperMode) {
        set_field(&mut self.chopconf, field::CHOPPER_MODE_BIT, 1, mode.bit());
        set_field(&mut self.chopconf, 4, 9, 0);
        self.dirty |= Register::ChopConf.dirty_mask();
        self.validity |= valid::CHOPPER_MODE;
        self.validity &=
            !(valid::HYSTERESIS_DECREMENT | valid::HYSTERESIS_START | valid::HYSTERESIS_END);
    }

    /// Set the comparator blanking time (CHOPCONF bits 15..=16).
    ///
    /// `clocks` must be one of 16, 24, 36 or 54 system clock periods. A
    /// blanking time below 24 clocks is rejected while the off time is set
    /// to 1, which the chip does not support.
    pub fn set_blanking_time(&mut self, clocks: u8) -> Result<(), ConfigError> {
        if self.validity & valid::OFF_TIME != 0
            && clocks < 24
            && get_field(self.chopconf, 0, 4) == 1
        {
            return Err(ConfigError::InvalidValue);
        }
        let code = match clocks {
            16 => 0,
            24 => 1,
            36 => 2,
            54 => 3,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(Register::ChopConf, 15, 2, code, valid::BLANKING_TIME);
        Ok(())
    }

    /// Randomly modulate the chopper off time by −12..+3 clocks (CHOPCONF
    /// bit 13).
    pub fn set_random_off_time(&mut self, enabled: bool) {
        self.update(Register::ChopConf, 13, 1, enabled as u32, valid::RANDOM_T_OFF);
    }

    /// Set the slow-decay duration (CHOPCONF bits 0..=3).
    ///
    /// Range 0..=15; 0 shuts the MOSFETs off entirely. A value of 1 needs
    /// a blanking time of at least 24 clocks and is rejected while the
    /// blanking time is set to 16.
    pub fn set_off_time(&mut self, value: u8) -> Result<(), ConfigError> {
        if self.validity & valid::BLANKING_TIME != 0
            && value == 1
            && get_field(self.chopconf, 15, 2) == 0
        {
            return Err(ConfigError::InvalidValue);
        }
        if value > 15 {
            return Err(ConfigError::InvalidValue);
        }
        self.update(Register::ChopConf, 0, 4, u32::from(value), valid::OFF_TIME);
        Ok(())
    }

    /// Set the hysteresis decrement period (CHOPCONF bits 11..=12,
    /// spreadCycle mode).
    ///
    /// `clocks` must be one of 16, 32, 48 or 64.
    pub fn set_hysteresis_decrement(&mut self, clocks: u8) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::SpreadCycle)?;
        let code = match clocks {
            16 => 0,
            32 => 1,
            48 => 2,
            64 => 3,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(Register::ChopConf, 11, 2, code, valid::HYSTERESIS_DECREMENT);
        Ok(())
    }

    /// Set the hysteresis start offset (CHOPCONF bits 4..=6, spreadCycle
    /// mode).
    ///
    /// Range 1..=8, added on top of the hysteresis end value. The chip
    /// requires start + end ≤ 15, checked here against the end value if
    /// one has been set.
    pub fn set_hysteresis_start(&mut self, value: u8) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::SpreadCycle)?;
        if !(1..=8).contains(&value) {
            return Err(ConfigError::InvalidValue);
        }
        if self.validity & valid::HYSTERESIS_END != 0
            && get_field(self.chopconf, 7, 4) as i8 - 3 + value as i8 > 15
        {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::ChopConf,
            4,
            3,
            u32::from(value - 1),
            valid::HYSTERESIS_START,
        );
        Ok(())
    }

    /// Set the hysteresis end (low) value (CHOPCONF bits 7..=10,
    /// spreadCycle mode).
    ///
    /// Range −3..=12, in 1/512 increments of the current setting. The chip
    /// requires start + end ≤ 15, checked here against the start value if
    /// one has been set.
    pub fn set_hysteresis_end(&mut self, value: i8) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::SpreadCycle)?;
        if !(-3..=12).contains(&value) {
            return Err(ConfigError::InvalidValue);
        }
        if self.validity & valid::HYSTERESIS_START != 0
            && get_field(self.chopconf, 4, 3) as i8 + 1 + value > 15
        {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::ChopConf,
            7,
            4,
            (value + 3) as u32,
            valid::HYSTERESIS_END,
        );
        Ok(())
    }

    /// Let only the timer terminate the fast-decay phase (CHOPCONF bit 12,
    /// fast-decay mode). When disabled the current comparator may cut the
    /// phase short.
    pub fn set_fast_decay_mode(&mut self, timer_only: bool) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::FastDecay)?;
        self.update(
            Register::ChopConf,
            12,
            1,
            timer_only as u32,
            valid::FAST_DECAY_MODE,
        );
        Ok(())
    }

    /// Set the sine wave offset (CHOPCONF bits 7..=10, fast-decay mode).
    ///
    /// Range −3..=12, added to the absolute value of each sine table
    /// entry in 1/512 increments.
    pub fn set_sine_offset(&mut self, value: i8) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::FastDecay)?;
        if !(-3..=12).contains(&value) {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::ChopConf,
            7,
            4,
            (value + 3) as u32,
            valid::SINE_OFFSET,
        );
        Ok(())
    }

    /// Set the fast-decay phase duration (CHOPCONF bits 4..=6 and 11,
    /// fast-decay mode).
    ///
    /// Range 0..=15. The low three bits and the MSB land in separate
    /// register fields.
    pub fn set_fast_decay_time(&mut self, value: u8) -> Result<(), ConfigError> {
        self.require_chopper_mode(ChopperMode::FastDecay)?;
        if value > 15 {
            return Err(ConfigError::InvalidValue);
        }
        set_field(&mut self.chopconf, 4, 3, u32::from(value));
        set_field(&mut self.chopconf, 11, 1, u32::from(value >> 3));
        self.dirty |= Register::ChopConf.dirty_mask();
        self.validity |= valid::FAST_DECAY_TIME;
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // SMARTEN
    ////////////////////////////////////////////////////////////////////////////////

    /// Set how far coolStep may reduce the motor current (SMARTEN bit 15).
    pub fn set_cool_step_current_floor(&mut self, floor: CoolStepCurrentFloor) {
        self.update(
            Register::SmartEn,
            15,
            1,
            floor.bit(),
            valid::COOL_STEP_CURRENT_FLOOR,
        );
    }

    /// Set the coolStep current decrement speed (SMARTEN bits 13..=14).
    ///
    /// `samples` is the number of stallGuard measurements at or above the
    /// upper threshold needed to step the current down: one of 32, 8, 2
    /// or 1.
    pub fn set_current_decrement_speed(&mut self, samples: u8) -> Result<(), ConfigError> {
        let code = match samples {
            32 => 0,
            8 => 1,
            2 => 2,
            1 => 3,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(
            Register::SmartEn,
            13,
            2,
            code,
            valid::CURRENT_DECREMENT_SPEED,
        );
        Ok(())
    }

    /// Set the upper coolStep threshold offset (SMARTEN bits 8..=11),
    /// range 0..=15.
    ///
    /// stallGuard readings at or above SEMIN + SEMAX decrement the current
    /// scaling factor.
    pub fn set_upper_cool_step_threshold(&mut self, value: u8) -> Result<(), ConfigError> {
        if value > 15 {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::SmartEn,
            8,
            4,
            u32::from(value),
            valid::UPPER_COOL_STEP_THRESHOLD,
        );
        Ok(())
    }

    /// Set the coolStep current increment size (SMARTEN bits 5..=6).
    ///
    /// `steps` is the number of increments applied per stallGuard reading
    /// below the lower threshold: one of 1, 2, 4 or 8.
    pub fn set_current_increment_size(&mut self, steps: u8) -> Result<(), ConfigError> {
        let code = match steps {
            1 => 0,
            2 => 1,
            4 => 2,
            8 => 3,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(Register::SmartEn, 5, 2, code, valid::CURRENT_INCREMENT_SIZE);
        Ok(())
    }

    /// Set the lower coolStep threshold (SMARTEN bits 0..=3), range
    /// 0..=15.
    ///
    /// 0 disables coolStep entirely; otherwise stallGuard readings below
    /// the threshold increase the current scaling factor.
    pub fn set_lower_cool_step_threshold(&mut self, value: u8) -> Result<(), ConfigError> {
        if value > 15 {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::SmartEn,
            0,
            4,
            u32::from(value),
            valid::LOWER_COOL_STEP_THRESHOLD,
        );
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // SGCSCONF
    ////////////////////////////////////////////////////////////////////////////////

    /// Filter the stallGuard measurement over four full steps (SGCSCONF
    /// bit 16). Unfiltered mode responds fastest.
    pub fn set_stall_guard_filter(&mut self, filtered: bool) {
        self.update(
            Register::SgcsConf,
            16,
            1,
            filtered as u32,
            valid::STALL_GUARD_FILTER,
        );
    }

    /// Set the stallGuard threshold (SGCSCONF bits 8..=14), range
    /// −64..=63.
    ///
    /// A lower value gives a higher load sensitivity.
    pub fn set_stall_guard_threshold(&mut self, value: i8) -> Result<(), ConfigError> {
        if !(-64..=63).contains(&value) {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::SgcsConf,
            8,
            7,
            value as u32,
            valid::STALL_GUARD_THRESHOLD,
        );
        Ok(())
    }

    /// Set the current-scale code (SGCSCONF bits 0..=4), range 1..=32.
    ///
    /// The coil current is `code / 32` of the full-scale current set by
    /// the sense resistor and [`SenseVoltage`]. Use
    /// [`Tmc26x::set_full_scale_current`] to derive the code from a target
    /// in milliamps.
    ///
    /// [`Tmc26x::set_full_scale_current`]: crate::Tmc26x::set_full_scale_current
    pub fn set_current_scale(&mut self, code: u8) -> Result<(), ConfigError> {
        if !(1..=32).contains(&code) {
            return Err(ConfigError::InvalidValue);
        }
        self.update(
            Register::SgcsConf,
            0,
            5,
            u32::from(code - 1),
            valid::CURRENT_SCALE,
        );
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // DRVCONF
    ////////////////////////////////////////////////////////////////////////////////

    /// Expose digital and analogue test values on SG_TST and TEST_ANA
    /// (DRVCONF bit 16). Normal operation leaves this off.
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.update(Register::DrvConf, 16, 1, enabled as u32, valid::TEST_MODE);
    }

    /// Set the high-side MOSFET slope control (DRVCONF bits 14..=15).
    pub fn set_slope_control_high(&mut self, slope: SlopeControl) -> Result<(), ConfigError> {
        let code = slope.high_side_code().ok_or(ConfigError::InvalidValue)?;
        self.update(Register::DrvConf, 14, 2, code, valid::SLOPE_CONTROL_HIGH);
        Ok(())
    }

    /// Set the low-side MOSFET slope control (DRVCONF bits 12..=13).
    pub fn set_slope_control_low(&mut self, slope: SlopeControl) -> Result<(), ConfigError> {
        let code = slope.low_side_code().ok_or(ConfigError::InvalidValue)?;
        self.update(Register::DrvConf, 12, 2, code, valid::SLOPE_CONTROL_LOW);
        Ok(())
    }

    /// Enable short-to-ground protection (DRVCONF bit 10).
    ///
    /// The hardware bit is *disable* short-to-ground protection, so the
    /// value is inverted before encoding. The logical reading is the one
    /// this API takes: `true` means protected.
    pub fn set_ground_short_protection(&mut self, enabled: bool) {
        self.update(
            Register::DrvConf,
            10,
            1,
            (!enabled) as u32,
            valid::GROUND_SHORT_PROTECTION,
        );
    }

    /// Set the short-to-ground detection delay (DRVCONF bits 8..=9).
    ///
    /// `tenths_of_us` must be one of 32, 16, 12 or 8 (3.2 µs down to
    /// 0.8 µs).
    pub fn set_ground_short_timer(&mut self, tenths_of_us: u8) -> Result<(), ConfigError> {
        let code = match tenths_of_us {
            32 => 0,
            16 => 1,
            12 => 2,
            8 => 3,
            _ => return Err(ConfigError::InvalidValue),
        };
        self.update(Register::DrvConf, 8, 2, code, valid::GROUND_SHORT_TIMER);
        Ok(())
    }

    /// Select the interface mode (DRVCONF bit 7).
    ///
    /// DRVCTRL's field layout depends on this bit, so DRVCTRL is reset to
    /// its address-only state, marked for retransmission, and the validity
    /// of whichever field interpretation is being left behind is dropped.
    /// The mode-specific DRVCTRL fields must be set again afterwards.
    pub fn set_drive_mode(&mut self, mode: DriveMode) {
        set_field(&mut self.drvconf, field::DRIVE_MODE_BIT, 1, mode.bit());
        self.dirty |= Register::DrvConf.dirty_mask() | Register::DrvCtrl.dirty_mask();
        self.validity |= valid::DRIVE_MODE;

        self.drvctrl = Register::DrvCtrl.address();
        match mode {
            DriveMode::Spi => {
                self.validity &= !(valid::POLARITY_A
                    | valid::POLARITY_B
                    | valid::CURRENT_A
                    | valid::CURRENT_B);
            }
            DriveMode::StepDir => {
                self.validity &= !(valid::STEP_INTERPOLATION
                    | valid::DOUBLE_EDGE
                    | valid::MICROSTEP_RESOLUTION);
                self.validity |= valid::DRVCTRL_BIT3;
            }
        }
    }

    /// Select the full-scale sense voltage (DRVCONF bit 6).
    ///
    /// Raising the sense voltage raises the coil current for a given
    /// current-scale code; [`Tmc26x::set_full_scale_current`] keeps the
    /// two in step and commits them in a safe order. Prefer it over
    /// setting this field directly.
    ///
    /// [`Tmc26x::set_full_scale_current`]: crate::Tmc26x::set_full_scale_current
    pub fn set_sense_voltage(&mut self, vsense: SenseVoltage) {
        self.update(
            Register::DrvConf,
            field::SENSE_VOLTAGE_BIT,
            1,
            vsense.bit(),
            valid::SENSE_VOLTAGE,
        );
    }

    /// Select the telemetry channel reported by the chip (DRVCONF bits
    /// 4..=5).
    ///
    /// The new channel takes effect once DRVCONF is committed; the reply
    /// to that very write still carries the previous channel's value.
    pub fn set_readback_channel(&mut self, channel: ReadbackChannel) {
        self.update(
            Register::DrvConf,
            field::READBACK_POS,
            field::READBACK_WIDTH,
            channel.code(),
            valid::READBACK_CHANNEL,
        );
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Internal helpers
    ////////////////////////////////////////////////////////////////////////////////

    /// Write a field and record the register as dirty and the field as
    /// explicitly set.
    fn update(
        &mut self,
        register: Register,
        position: usize,
        width: usize,
        value: u32,
        valid_bit: u32,
    ) {
        let reg = match register {
            Register::DrvCtrl => &mut self.drvctrl,
            Register::ChopConf => &mut self.chopconf,
            Register::SmartEn => &mut self.smarten,
            Register::SgcsConf => &mut self.sgcsconf,
            Register::DrvConf => &mut self.drvconf,
        };
        set_field(reg, position, width, value);
        self.dirty |= register.dirty_mask();
        self.validity |= valid_bit;
    }

    fn require_drive_mode(&self, required: DriveMode) -> Result<(), ConfigError> {
        match self.drive_mode() {
            Some(mode) if mode == required => Ok(()),
            _ => Err(ConfigError::InvalidMode),
        }
    }

    fn require_chopper_mode(&self, required: ChopperMode) -> Result<(), ConfigError> {
        match self.chopper_mode() {
            Some(mode) if mode == required => Ok(()),
            _ => Err(ConfigError::InvalidMode),
        }
    }

    pub(crate) fn clear_dirty(&mut self, register: Register) {
        self.dirty &= !register.dirty_mask();
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_marks_all_registers_dirty_and_only_the_sentinel_valid() {
        let config = Configuration::new();
        assert!(config.is_dirty());
        for register in [
            Register::DrvCtrl,
            Register::ChopConf,
            Register::SmartEn,
            Register::SgcsConf,
            Register::DrvConf,
        ] {
            assert!(config.is_register_dirty(register));
            assert_eq!(config.register(register), register.address());
        }
        assert_eq!(config.validity, valid::INITIAL);
        assert!(!config.is_fully_specified());
    }

    #[test]
    fn step_dir_setter_requires_drive_mode_to_be_known() {
        let mut config = Configuration::new();
        let before = config.clone();
        assert_eq!(
            config.set_microstep_resolution(256),
            Err(ConfigError::InvalidMode)
        );
        assert_eq!(config, before);
    }

    #[test]
    fn step_dir_setter_rejects_spi_mode() {
        let mut config = Configuration::new();
        config.set_drive_mode(DriveMode::Spi);
        let before = config.clone();
        assert_eq!(
            config.set_step_interpolation(true),
            Err(ConfigError::InvalidMode)
        );
        assert_eq!(config, before);
    }

    #[test]
    fn spi_setter_rejects_step_dir_mode() {
        let mut config = Configuration::new();
        config.set_drive_mode(DriveMode::StepDir);
        assert_eq!(config.set_current_a(200), Err(ConfigError::InvalidMode));
        assert!(config.set_polarity_a(true).is_err());
    }

    #[test]
    fn microstep_resolution_uses_the_lookup_table() {
        let mut config = Configuration::new();
        config.set_drive_mode(DriveMode::StepDir);
        config.set_microstep_resolution(256).unwrap();
        assert_eq!(get_field(config.register(Register::DrvCtrl), 0, 4), 0);
        config.set_microstep_resolution(1).unwrap();
        assert_eq!(get_field(config.register(Register::DrvCtrl), 0, 4), 8);
        assert_eq!(
            config.set_microstep_resolution(100),
            Err(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn hysteresis_sum_is_checked_in_both_set_orders() {
        let mut config = Configuration::new();
        config.set_chopper_mode(ChopperMode::SpreadCycle);

        config.set_hysteresis_start(8).unwrap();
        let before = config.clone();
        assert_eq!(config.set_hysteresis_end(10), Err(ConfigError::InvalidValue));
        assert_eq!(config, before);

        let mut config = Configuration::new();
        config.set_chopper_mode(ChopperMode::SpreadCycle);
        config.set_hysteresis_end(10).unwrap();
        assert_eq!(
            config.set_hysteresis_start(8),
            Err(ConfigError::InvalidValue)
        );
        // The pair fits once the end value shrinks.
        config.set_hysteresis_end(7).unwrap();
        config.set_hysteresis_start(8).unwrap();
    }

    #[test]
    fn hysteresis_needs_spread_cycle_mode() {
        let mut config = Configuration::new();
        config.set_chopper_mode(ChopperMode::FastDecay);
        assert_eq!(
            config.set_hysteresis_start(4),
            Err(ConfigError::InvalidMode)
        );
        assert_eq!(config.set_sine_offset(5), Ok(()));
    }

    #[test]
    fn off_time_of_one_needs_long_blanking() {
        let mut config = Configuration::new();
        config.set_blanking_time(16).unwrap();
        assert_eq!(config.set_off_time(1), Err(ConfigError::InvalidValue));
        config.set_blanking_time(24).unwrap();
        config.set_off_time(1).unwrap();
        // And the check holds in the reverse order.
        assert_eq!(config.set_blanking_time(16), Err(ConfigError::InvalidValue));
        config.set_blanking_time(36).unwrap();
    }

    #[test]
    fn chopper_mode_change_resets_the_dependent_fields() {
        let mut config = Configuration::new();
        config.set_chopper_mode(ChopperMode::SpreadCycle);
        config.set_hysteresis_decrement(32).unwrap();
        config.set_hysteresis_start(5).unwrap();
        config.set_hysteresis_end(3).unwrap();
        assert_ne!(get_field(config.register(Register::ChopConf), 4, 9), 0);

        config.set_chopper_mode(ChopperMode::FastDecay);
        assert_eq!(get_field(config.register(Register::ChopConf), 4, 9), 0);
        // The spreadCycle values are gone, and so is their validity.
        assert_eq!(config.validity & valid::HYSTERESIS_START, 0);
        assert_eq!(config.set_fast_decay_time(9), Ok(()));
    }

    #[test]
    fn drive_mode_change_resets_drvctrl() {
        let mut config = Configuration::new();
        config.set_drive_mode(DriveMode::StepDir);
        config.set_microstep_resolution(64).unwrap();
        config.clear_dirty(Register::DrvCtrl);

        config.set_drive_mode(DriveMode::Spi);
        assert_eq!(
            config.register(Register::DrvCtrl),
            Register::DrvCtrl.address()
        );
        assert!(config.is_register_dirty(Register::DrvCtrl));
        assert!(config.is_register_dirty(Register::DrvConf));
        // The step/dir fields are no longer valid in SPI mode.
        assert_eq!(
            config.set_current_a(10),
            Ok(()),
            "SPI-mode setter must be usable after the switch"
        );
    }

    #[test]
    fn current_scale_accepts_only_one_through_thirty_two() {
        let mut config = Configuration::new();
        assert_eq!(config.set_current_scale(0), Err(ConfigError::InvalidValue));
        assert_eq!(config.set_current_scale(33), Err(ConfigError::InvalidValue));
        config.set_current_scale(1).unwrap();
        assert_eq!(get_field(config.register(Register::SgcsConf), 0, 5), 0);
        config.set_current_scale(32).unwrap();
        assert_eq!(get_field(config.register(Register::SgcsConf), 0, 5), 31);
    }

    #[test]
    fn stall_guard_threshold_is_twos_complement_encoded() {
        let mut config = Configuration::new();
        config.set_stall_guard_threshold(-3).unwrap();
        assert_eq!(get_field(config.register(Register::SgcsConf), 8, 7), 0x7D);
        config.set_stall_guard_threshold(63).unwrap();
        assert_eq!(get_field(config.register(Register::SgcsConf), 8, 7), 63);
        assert_eq!(
            config.set_stall_guard_threshold(-65),
            Err(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn ground_short_protection_is_inverted_on_the_wire() {
        let mut config = Configuration::new();
        config.set_ground_short_protection(true);
        assert_eq!(get_field(config.register(Register::DrvConf), 10, 1), 0);
        config.set_ground_short_protection(false);
        assert_eq!(get_field(config.register(Register::DrvConf), 10, 1), 1);
    }

    #[test]
    fn slope_control_sides_accept_different_variants() {
        let mut config = Configuration::new();
        assert_eq!(
            config.set_slope_control_high(SlopeControl::Medium),
            Err(ConfigError::InvalidValue)
        );
        assert_eq!(
            config.set_slope_control_low(SlopeControl::MediumTemperatureCompensation),
            Err(ConfigError::InvalidValue)
        );
        config
            .set_slope_control_high(SlopeControl::MediumTemperatureCompensation)
            .unwrap();
        config.set_slope_control_low(SlopeControl::Medium).unwrap();
        assert_eq!(get_field(config.register(Register::DrvConf), 14, 2), 2);
        assert_eq!(get_field(config.register(Register::DrvConf), 12, 2), 2);
    }

    #[test]
    fn address_prefix_survives_every_setter() {
        let mut config = Configuration::new();
        config.set_chopper_mode(ChopperMode::SpreadCycle);
        config.set_blanking_time(54).unwrap();
        config.set_off_time(15).unwrap();
        config.set_hysteresis_decrement(64).unwrap();
        config.set_hysteresis_start(8).unwrap();
        assert_eq!(
            config.register(Register::ChopConf) & 0xE0000,
            Register::ChopConf.address()
        );
        config.set_test_mode(true);
        config.set_readback_channel(ReadbackChannel::CoolStep);
        assert_eq!(
            config.register(Register::DrvConf) & 0xE0000,
            Register::DrvConf.address()
        );
    }

    #[test]
    fn readback_channel_reports_none_until_set() {
        let mut config = Configuration::new();
        assert_eq!(config.readback_channel(), None);
        config.set_readback_channel(ReadbackChannel::StallGuard);
        assert_eq!(
            config.readback_channel(),
            Some(ReadbackChannel::StallGuard)
        );
    }
}
