//! The TMC26x driver: commit protocol, current control and readback.

use crate::config::Configuration;
use crate::current::{self, SenseVoltage};
use crate::error::{ConfigError, Error};
use crate::registers::{ReadbackChannel, Register};
use crate::transport::Transport;

/// Driver for the TMC260/TMC261/TMC262.
///
/// Owns the [`Transport`] to the chip, the [`Configuration`] mirror and
/// the board's sense-resistor value. Field changes are made through
/// [`Tmc26x::configuration_mut`] (or [applied from a profile]) and reach
/// the chip when a commit transmits the dirty registers.
///
/// [applied from a profile]: Tmc26x::initialize_with_profile
///
/// # Commit ordering
///
/// The commit order is fixed so that no intermediate register combination
/// can over-drive the motor coil: when the full-scale sense voltage is
/// being raised, the (lowered) current-scale code must reach the chip
/// before the DRVCONF register that raises the voltage. The
/// current-setting operations compute this ordering themselves; it is not
/// something callers can get wrong unless they drive
/// [`Configuration::set_sense_voltage`] and [`Tmc26x::commit`] by hand.
pub struct Tmc26x<T> {
    transport: T,
    config: Configuration,
    rsense_mohm: u16,
}

impl<T> Tmc26x<T> {
    /// Create a driver over the given transport.
    ///
    /// `rsense_mohm` is the board's sense-resistor value in milliohms,
    /// used whenever a current target in mA is converted to a
    /// current-scale code. The configuration starts out fresh: every
    /// register dirty, no field valid.
    pub fn new(transport: T, rsense_mohm: u16) -> Self {
        Self {
            transport,
            config: Configuration::new(),
            rsense_mohm,
        }
    }

    /// The configuration mirror.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// The configuration mirror, for making field changes.
    pub fn configuration_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// The underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T> Tmc26x<T>
where
    T: Transport,
{
    ////////////////////////////////////////////////////////////////////////////////
    // Datagram exchange
    ////////////////////////////////////////////////////////////////////////////////

    /// Exchange one 20-bit datagram with the chip.
    ///
    /// The register value is shifted out as three bytes, most significant
    /// first. The 24 bits shifted back in the same transaction carry the
    /// previous readback-selected value; the low status nibble is dropped
    /// and the 20-bit reply returned.
    fn exchange(&mut self, raw: u32) -> Result<u32, Error<T::Error>> {
        self.transport.chip_select().map_err(Error::Transport)?;
        let exchanged = self.exchange_bytes(raw);
        // Deselect even after a failed byte; the first error wins.
        let deselected = self.transport.chip_deselect();
        let reply = exchanged?;
        deselected.map_err(Error::Transport)?;
        Ok(reply)
    }

    fn exchange_bytes(&mut self, raw: u32) -> Result<u32, Error<T::Error>> {
        let [_, high, mid, low] = raw.to_be_bytes();
        let mut reply = 0u32;
        for byte in [high, mid, low] {
            let read = self
                .transport
                .transceive_byte(byte)
                .map_err(Error::Transport)?;
            reply = (reply << 8) | u32::from(read);
        }
        Ok((reply >> 4) & 0xF_FFFF)
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Commit protocol
    ////////////////////////////////////////////////////////////////////////////////

    /// Transmit every dirty register to the chip.
    ///
    /// Fails with [`ConfigError::InvalidConfig`] before transmitting
    /// anything unless the configuration is [fully specified]. Registers
    /// are sent in a fixed precedence — SGCSCONF first when
    /// `prioritize_current_scale` is set, then DRVCONF, SGCSCONF (if not
    /// already sent), DRVCTRL, CHOPCONF, SMARTEN — and each register's
    /// dirty bit is cleared as its bytes go out, so a transport error
    /// leaves exactly the un-sent registers dirty and a retry resends
    /// only those.
    ///
    /// [fully specified]: Configuration::is_fully_specified
    ///
    /// Set `prioritize_current_scale` when this commit raises the sense
    /// voltage: the lowered current-scale code must land before DRVCONF
    /// carries the higher voltage, or the coil sees the old code at the
    /// new scale. [`Tmc26x::set_full_scale_current`] works this out from
    /// the old and new sense voltage; plain configuration flushes pass
    /// `false`.
    pub fn commit(&mut self, prioritize_current_scale: bool) -> Result<(), Error<T::Error>> {
        if !self.config.is_fully_specified() {
            return Err(ConfigError::InvalidConfig.into());
        }

        if prioritize_current_scale {
            self.flush_register(Register::SgcsConf)?;
        }
        self.flush_register(Register::DrvConf)?;
        self.flush_register(Register::SgcsConf)?;
        self.flush_register(Register::DrvCtrl)?;
        self.flush_register(Register::ChopConf)?;
        self.flush_register(Register::SmartEn)?;
        Ok(())
    }

    /// Send one register if it is dirty, clearing its dirty bit on
    /// success.
    fn flush_register(&mut self, register: Register) -> Result<(), Error<T::Error>> {
        if !self.config.is_register_dirty(register) {
            return Ok(());
        }
        self.exchange(self.config.register(register))?;
        self.config.clear_dirty(register);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Current control
    ////////////////////////////////////////////////////////////////////////////////

    /// Set the full-scale motor current and commit the configuration.
    ///
    /// Picks the sense voltage for the target (165 mV unless the current
    /// only fits the 305 mV range), derives the current-scale code with
    /// the board's sense resistance, writes both fields and commits. When
    /// the sense voltage rises from 165 mV to 305 mV the commit sends the
    /// current-scale register first — see [`Tmc26x::commit`]. A previously
    /// unset sense voltage is treated as 305 mV, the direction that needs
    /// no precaution.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if the target current is not
    /// representable, [`ConfigError::InvalidConfig`] if the configuration
    /// is not yet fully specified, or a transport error from the commit.
    pub fn set_full_scale_current(&mut self, current_ma: u16) -> Result<(), Error<T::Error>> {
        let old_vsense = self
            .config
            .sense_voltage()
            .unwrap_or(SenseVoltage::_305_mV);
        let new_vsense = current::select_sense_voltage(current_ma, self.rsense_mohm);

        let code = current::current_scale_code(current_ma, self.rsense_mohm, new_vsense)?;
        self.config.set_current_scale(code)?;
        self.config.set_sense_voltage(new_vsense);

        let raising =
            old_vsense == SenseVoltage::_165_mV && new_vsense == SenseVoltage::_305_mV;
        self.commit(raising)
    }

    /// Re-apply the stored driving-current target.
    ///
    /// See [`Configuration::set_driving_current`] and
    /// [`Tmc26x::set_full_scale_current`].
    pub fn apply_driving_current(&mut self) -> Result<(), Error<T::Error>> {
        self.set_full_scale_current(self.config.driving_current())
    }

    /// Re-apply the stored stationary-current target.
    ///
    /// See [`Configuration::set_stationary_current`] and
    /// [`Tmc26x::set_full_scale_current`].
    pub fn apply_stationary_current(&mut self) -> Result<(), Error<T::Error>> {
        self.set_full_scale_current(self.config.stationary_current())
    }

    ////////////////////////////////////////////////////////////////////////////////
    // Readback
    ////////////////////////////////////////////////////////////////////////////////

    /// Read the stallGuard load measurement (10 bits, bits 10..=19 of the
    /// reply).
    pub fn read_stall_guard(&mut self) -> Result<u16, Error<T::Error>> {
        let reply = self.read_channel(ReadbackChannel::StallGuard)?;
        Ok((reply >> 10) as u16)
    }

    /// Read the microstep position (bits 10..=19 of the reply).
    pub fn read_micro_step(&mut self) -> Result<u16, Error<T::Error>> {
        let reply = self.read_channel(ReadbackChannel::MicroStep)?;
        Ok((reply >> 10) as u16)
    }

    /// Read the coolStep current scaling value (5 bits, bits 10..=14 of
    /// the reply).
    pub fn read_cool_step(&mut self) -> Result<u16, Error<T::Error>> {
        let reply = self.read_channel(ReadbackChannel::CoolStep)?;
        Ok((reply >> 10) as u16 & 0x1F)
    }

    /// Read the currently selected channel without interpreting it,
    /// returning bits 4..=19 of the reply.
    ///
    /// Unlike the channel reads this neither changes the readback select
    /// nor commits pending configuration; it reports whatever the chip is
    /// already configured to emit.
    pub fn read_raw(&mut self) -> Result<u16, Error<T::Error>> {
        let reply = self.exchange(self.config.register(Register::DrvConf))?;
        Ok((reply >> 4) as u16)
    }

    /// Make sure the chip is emitting `channel` and the configuration is
    /// in sync, then exchange one datagram and return the 20-bit reply.
    ///
    /// The chip replies with the channel selected by the *previously
    /// committed* DRVCONF, so a channel change (or any pending register
    /// write) forces a commit before the read transaction.
    fn read_channel(&mut self, channel: ReadbackChannel) -> Result<u32, Error<T::Error>> {
        if self.config.readback_channel() != Some(channel) || self.config.is_dirty() {
            self.config.set_readback_channel(channel);
            self.commit(false)?;
        }
        self.exchange(self.config.register(Register::DrvConf))
    }
}
