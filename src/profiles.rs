//! Built-in motor profiles.
//!
//! Each profile is a complete step/dir + spreadCycle configuration for a
//! specific motor, taken from bench tuning against that motor's datasheet.
//! Applying one sets every chip field, so the result is immediately
//! committable.

use crate::Tmc26x;
use crate::config::{ChopperMode, Configuration, CoolStepCurrentFloor, DriveMode, SlopeControl};
use crate::error::{ConfigError, Error};
use crate::registers::ReadbackChannel;
use crate::transport::Transport;

/// Identifier of a built-in motor profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorProfile {
    /// Long's Motor 23HS7430.
    Longs23Hs7430,
    /// Long's Motor 23HS0420.
    Longs23Hs0420,
    /// NanoTec ST5918M1008-A, run in parallel coil mode.
    NanoTecSt5918M1008A,
    /// Zapp Automation SY42STH47-1684A.
    ZappSy42Sth471684A,
}

impl MotorProfile {
    /// The profile's settings record.
    pub fn settings(self) -> &'static StepDirSpreadCycleProfile {
        match self {
            MotorProfile::Longs23Hs7430 => &LONGS_23HS7430,
            MotorProfile::Longs23Hs0420 => &LONGS_23HS0420,
            MotorProfile::NanoTecSt5918M1008A => &NANOTEC_ST5918M1008A,
            MotorProfile::ZappSy42Sth471684A => &ZAPP_SY42STH47_1684A,
        }
    }
}

/// Numeric profile ids, for callers that store the selection.
impl TryFrom<u8> for MotorProfile {
    type Error = ConfigError;

    fn try_from(id: u8) -> Result<Self, ConfigError> {
        match id {
            1 => Ok(MotorProfile::Longs23Hs7430),
            2 => Ok(MotorProfile::Longs23Hs0420),
            3 => Ok(MotorProfile::NanoTecSt5918M1008A),
            4 => Ok(MotorProfile::ZappSy42Sth471684A),
            _ => Err(ConfigError::InvalidProfile),
        }
    }
}

/// A complete step/dir + spreadCycle motor configuration.
///
/// Plain data; [`Tmc26x::apply_profile`] turns it into chip state. Values
/// are in the physical units the corresponding setters take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepDirSpreadCycleProfile {
    /// STEP pulse interpolation.
    pub step_interpolation: bool,
    /// Both STEP edges active.
    pub double_edge: bool,
    /// Microsteps per full step.
    pub microstep_resolution: u16,
    /// Comparator blanking time in clocks.
    pub blanking_time: u8,
    /// Random off-time modulation.
    pub random_off_time: bool,
    /// Slow-decay duration.
    pub off_time: u8,
    /// Hysteresis decrement period in clocks.
    pub hysteresis_decrement: u8,
    /// Hysteresis start offset.
    pub hysteresis_start: u8,
    /// Hysteresis end value.
    pub hysteresis_end: i8,
    /// coolStep current floor.
    pub cool_step_current_floor: CoolStepCurrentFloor,
    /// coolStep current decrement speed in samples.
    pub current_decrement_speed: u8,
    /// Upper coolStep threshold offset.
    pub upper_cool_step_threshold: u8,
    /// coolStep current increment size in steps.
    pub current_increment_size: u8,
    /// Lower coolStep threshold; 0 disables coolStep.
    pub lower_cool_step_threshold: u8,
    /// stallGuard filtering.
    pub stall_guard_filter: bool,
    /// stallGuard threshold.
    pub stall_guard_threshold: i8,
    /// Test-mode pins exposed.
    pub test_mode: bool,
    /// High-side slope control.
    pub slope_control_high: SlopeControl,
    /// Low-side slope control.
    pub slope_control_low: SlopeControl,
    /// Short-to-ground protection.
    pub ground_short_protection: bool,
    /// Short-to-ground detection delay in tenths of microseconds.
    pub ground_short_timer: u8,
    /// Current target while moving, in mA.
    pub driving_current: u16,
    /// Current target while holding position, in mA.
    pub stationary_current: u16,
}

// http://www.longs-motor.com/productinfo/detail_12_25_114.aspx
static LONGS_23HS7430: StepDirSpreadCycleProfile = StepDirSpreadCycleProfile {
    step_interpolation: false,
    double_edge: false,
    microstep_resolution: 256,
    blanking_time: 16,
    random_off_time: true,
    off_time: 4,
    hysteresis_decrement: 16,
    hysteresis_start: 5,
    hysteresis_end: 0,
    cool_step_current_floor: CoolStepCurrentFloor::Quarter,
    current_decrement_speed: 32,
    upper_cool_step_threshold: 4,
    current_increment_size: 1,
    lower_cool_step_threshold: 0,
    stall_guard_filter: false,
    stall_guard_threshold: 16,
    test_mode: false,
    slope_control_high: SlopeControl::Minimum,
    slope_control_low: SlopeControl::Minimum,
    ground_short_protection: true,
    ground_short_timer: 32,
    driving_current: 2000,
    stationary_current: 250,
};

// http://www.longs-motor.com/productinfo/detail_12_25_114.aspx
static LONGS_23HS0420: StepDirSpreadCycleProfile = StepDirSpreadCycleProfile {
    step_interpolation: false,
    double_edge: false,
    microstep_resolution: 256,
    blanking_time: 24,
    random_off_time: true,
    off_time: 2,
    hysteresis_decrement: 16,
    hysteresis_start: 3,
    hysteresis_end: 0,
    cool_step_current_floor: CoolStepCurrentFloor::Quarter,
    current_decrement_speed: 32,
    upper_cool_step_threshold: 4,
    current_increment_size: 1,
    lower_cool_step_threshold: 0,
    stall_guard_filter: false,
    stall_guard_threshold: 4,
    test_mode: false,
    slope_control_high: SlopeControl::Minimum,
    slope_control_low: SlopeControl::Minimum,
    ground_short_protection: true,
    ground_short_timer: 32,
    driving_current: 2000,
    stationary_current: 400,
};

// http://en.nanotec.com/fileadmin/files/Datenblaetter/Schrittmotoren/ST5918/ST5918M1008-A.pdf
static NANOTEC_ST5918M1008A: StepDirSpreadCycleProfile = StepDirSpreadCycleProfile {
    step_interpolation: false,
    double_edge: false,
    microstep_resolution: 256,
    blanking_time: 24,
    random_off_time: true,
    off_time: 2,
    hysteresis_decrement: 16,
    hysteresis_start: 5,
    hysteresis_end: 0,
    cool_step_current_floor: CoolStepCurrentFloor::Quarter,
    current_decrement_speed: 32,
    upper_cool_step_threshold: 4,
    current_increment_size: 1,
    lower_cool_step_threshold: 0,
    stall_guard_filter: false,
    stall_guard_threshold: 4,
    test_mode: false,
    slope_control_high: SlopeControl::Minimum,
    slope_control_low: SlopeControl::Minimum,
    ground_short_protection: true,
    ground_short_timer: 32,
    driving_current: 1410,
    stationary_current: 400,
};

// http://www.zappautomation.co.uk/electrical-products/stepper-motors/nema-17-stepper-motors/sy42sth47-1684a-high-torque-hybrid-stepper-motors.html
static ZAPP_SY42STH47_1684A: StepDirSpreadCycleProfile = StepDirSpreadCycleProfile {
    step_interpolation: false,
    double_edge: false,
    microstep_resolution: 256,
    blanking_time: 16,
    random_off_time: false,
    off_time: 2,
    hysteresis_decrement: 16,
    hysteresis_start: 5,
    hysteresis_end: 0,
    cool_step_current_floor: CoolStepCurrentFloor::Quarter,
    current_decrement_speed: 32,
    upper_cool_step_threshold: 4,
    current_increment_size: 1,
    lower_cool_step_threshold: 0,
    stall_guard_filter: false,
    stall_guard_threshold: 24,
    test_mode: false,
    slope_control_high: SlopeControl::Minimum,
    slope_control_low: SlopeControl::Minimum,
    ground_short_protection: true,
    ground_short_timer: 32,
    driving_current: 1280,
    stationary_current: 200,
};

impl<T> Tmc26x<T>
where
    T: Transport,
{
    /// Reset the configuration and bring the chip up with a built-in
    /// motor profile.
    ///
    /// Equivalent to a fresh [`Configuration`] followed by
    /// [`Tmc26x::apply_profile`].
    ///
    /// [`Configuration`]: crate::Configuration
    pub fn initialize_with_profile(
        &mut self,
        profile: MotorProfile,
    ) -> Result<(), Error<T::Error>> {
        *self.configuration_mut() = Configuration::new();
        self.apply_profile(profile.settings())
    }

    /// Apply a step/dir + spreadCycle profile and commit it.
    ///
    /// The two mode fields go first (they reset their dependent fields),
    /// then every remaining field, readback preselected to stallGuard.
    /// The profile's current targets are stored and the driving current
    /// applied, which performs the commit.
    pub fn apply_profile(
        &mut self,
        profile: &StepDirSpreadCycleProfile,
    ) -> Result<(), Error<T::Error>> {
        let config = self.configuration_mut();
        config.set_chopper_mode(ChopperMode::SpreadCycle);
        config.set_drive_mode(DriveMode::StepDir);

        config.set_step_interpolation(profile.step_interpolation)?;
        config.set_double_edge(profile.double_edge)?;
        config.set_microstep_resolution(profile.microstep_resolution)?;

        config.set_blanking_time(profile.blanking_time)?;
        config.set_random_off_time(profile.random_off_time);
        config.set_off_time(profile.off_time)?;
        config.set_hysteresis_decrement(profile.hysteresis_decrement)?;
        config.set_hysteresis_start(profile.hysteresis_start)?;
        config.set_hysteresis_end(profile.hysteresis_end)?;

        config.set_stall_guard_filter(profile.stall_guard_filter);
        config.set_stall_guard_threshold(profile.stall_guard_threshold)?;

        config.set_cool_step_current_floor(profile.cool_step_current_floor);
        config.set_current_decrement_speed(profile.current_decrement_speed)?;
        config.set_upper_cool_step_threshold(profile.upper_cool_step_threshold)?;
        config.set_current_increment_size(profile.current_increment_size)?;
        config.set_lower_cool_step_threshold(profile.lower_cool_step_threshold)?;

        config.set_test_mode(profile.test_mode);
        config.set_slope_control_high(profile.slope_control_high)?;
        config.set_slope_control_low(profile.slope_control_low)?;
        config.set_ground_short_protection(profile.ground_short_protection);
        config.set_ground_short_timer(profile.ground_short_timer)?;
        config.set_readback_channel(ReadbackChannel::StallGuard);

        config.set_driving_current(profile.driving_current);
        config.set_stationary_current(profile.stationary_current);
        self.apply_driving_current()
    }
}

#[cfg(test)]
mod tests {
    use super::MotorProfile;
    use crate::error::ConfigError;

    #[test]
    fn numeric_ids_match_the_table() {
        assert_eq!(MotorProfile::try_from(1), Ok(MotorProfile::Longs23Hs7430));
        assert_eq!(
            MotorProfile::try_from(4),
            Ok(MotorProfile::ZappSy42Sth471684A)
        );
        assert_eq!(MotorProfile::try_from(0), Err(ConfigError::InvalidProfile));
        assert_eq!(MotorProfile::try_from(5), Err(ConfigError::InvalidProfile));
    }

    #[test]
    fn every_profile_pairs_legal_blanking_and_off_times() {
        for profile in [
            MotorProfile::Longs23Hs7430,
            MotorProfile::Longs23Hs0420,
            MotorProfile::NanoTecSt5918M1008A,
            MotorProfile::ZappSy42Sth471684A,
        ] {
            let settings = profile.settings();
            assert!(settings.off_time != 1 || settings.blanking_time >= 24);
            assert!(settings.hysteresis_start as i8 + settings.hysteresis_end <= 15);
        }
    }
}
