//! Motor current to current-scale code conversion.

use crate::error::ConfigError;

/// Full-scale sense-resistor voltage selection (DRVCONF VSENSE bit).
///
/// Together with the board's sense resistor this sets the current that a
/// current-scale code of 32 drives through the coil. The lower setting
/// halves(ish) the full-scale current and is preferred for resolution;
/// the driver switches to 305 mV only when the requested current cannot
/// be represented at 165 mV.
///
/// # Datasheet
///
/// See the DRVCONF VSENSE bit on page 23 and the current scaling formula
/// in section 9 of the TMC260/TMC261 datasheet (Rev. 2.05 / 2012-NOV-05).
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SenseVoltage {
    /// 305 mV full-scale sense voltage.
    _305_mV,
    /// 165 mV full-scale sense voltage.
    _165_mV,
}

impl SenseVoltage {
    /// The full-scale voltage in millivolts, as used by the scaling
    /// formula.
    pub const fn millivolts(self) -> u32 {
        match self {
            SenseVoltage::_305_mV => 305,
            SenseVoltage::_165_mV => 165,
        }
    }

    /// Encoding of the DRVCONF VSENSE bit.
    pub(crate) const fn bit(self) -> u32 {
        match self {
            SenseVoltage::_305_mV => 0,
            SenseVoltage::_165_mV => 1,
        }
    }

    pub(crate) const fn from_bit(bit: u32) -> Self {
        if bit == 0 {
            SenseVoltage::_305_mV
        } else {
            SenseVoltage::_165_mV
        }
    }
}

/// Current-scale steps per full scale: CS codes span 1..=32.
const SCALE_STEPS: u64 = 32;

/// `sqrt(2) * 1000`, converting an RMS milliamp target to peak.
const RMS_TO_PEAK_MILLI: u64 = 1414;

/// Compute the current-scale code for a target RMS coil current.
///
/// `rsense_mohm` is the board's sense-resistor value in milliohms. The
/// arithmetic follows the datasheet's scaling formula in fixed point, with
/// the final division rounded half-up.
///
/// # Errors
///
/// [`ConfigError::InvalidValue`] if the requested current needs a code
/// above 32, which has no representation at the given sense voltage. A
/// result of 0 is returned as-is; the current-scale setter rejects it,
/// since the chip's lowest drive strength is code 1.
pub fn current_scale_code(
    current_ma: u16,
    rsense_mohm: u16,
    vsense: SenseVoltage,
) -> Result<u8, ConfigError> {
    let scaled = u64::from(rsense_mohm) * u64::from(current_ma) * RMS_TO_PEAK_MILLI
        / u64::from(vsense.millivolts());

    let step = 1_000_000 / SCALE_STEPS;
    let mut code = scaled / step;
    if scaled % step >= step / 2 {
        code += 1;
    }

    if code > SCALE_STEPS {
        return Err(ConfigError::InvalidValue);
    }
    Ok(code as u8)
}

/// Pick the sense voltage for a target current.
///
/// The lower setting is used unless the current exceeds the largest
/// current representable at 165 mV, in which case the full 305 mV range
/// is needed. A two-point decision, nothing to search.
pub(crate) fn select_sense_voltage(current_ma: u16, rsense_mohm: u16) -> SenseVoltage {
    let threshold = u64::from(SenseVoltage::_165_mV.millivolts()) * 1_000_000
        / (u64::from(rsense_mohm) * RMS_TO_PEAK_MILLI);
    if u64::from(current_ma) > threshold {
        SenseVoltage::_305_mV
    } else {
        SenseVoltage::_165_mV
    }
}

#[cfg(test)]
mod tests {
    use super::{SenseVoltage, current_scale_code, select_sense_voltage};
    use crate::error::ConfigError;

    #[test]
    fn one_amp_at_305_mv_over_75_mohm() {
        // 75 * 1000 * 1414 / 305 = 347_704; /31_250 = 11 rem 3_954, which
        // stays below half a step.
        assert_eq!(current_scale_code(1000, 75, SenseVoltage::_305_mV), Ok(11));
    }

    #[test]
    fn remainder_of_half_a_step_rounds_up() {
        // 75 * 250 * 1414 / 165 = 160_681; /31_250 = 5 rem 4_431 -> down.
        assert_eq!(current_scale_code(250, 75, SenseVoltage::_165_mV), Ok(5));
        // 75 * 1000 * 1414 / 165 = 642_727; /31_250 = 20 rem 17_227 -> up.
        assert_eq!(current_scale_code(1000, 75, SenseVoltage::_165_mV), Ok(21));
    }

    #[test]
    fn over_range_current_is_rejected() {
        assert_eq!(
            current_scale_code(3000, 75, SenseVoltage::_165_mV),
            Err(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn huge_inputs_do_not_wrap() {
        assert_eq!(
            current_scale_code(u16::MAX, u16::MAX, SenseVoltage::_165_mV),
            Err(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn sense_voltage_switches_at_the_165_mv_ceiling() {
        // 165 * 1_000_000 / (75 * 1414) = 1_555.
        assert_eq!(select_sense_voltage(1555, 75), SenseVoltage::_165_mV);
        assert_eq!(select_sense_voltage(1556, 75), SenseVoltage::_305_mV);
    }
}
