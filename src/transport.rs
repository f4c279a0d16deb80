//! The byte-level link between the driver and the chip.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

/// Byte-level transport to the TMC26x.
///
/// The chip speaks a 20-bit datagram protocol over SPI mode 3 with an
/// active-low chip select. The driver brackets every datagram in a
/// select/deselect pair and exchanges exactly three bytes in between;
/// implementations only need to provide those primitives.
///
/// [`SpiTransport`] covers the common case of an [`embedded_hal`] SPI bus
/// plus a GPIO chip-select pin. Implement this trait directly for
/// anything else (a shared-bus wrapper, an RTT test recorder, ...).
pub trait Transport {
    /// Error raised by the underlying link.
    type Error;

    /// Assert chip select, opening a datagram transaction.
    fn chip_select(&mut self) -> Result<(), Self::Error>;

    /// Release chip select, latching the transferred datagram.
    fn chip_deselect(&mut self) -> Result<(), Self::Error>;

    /// Shift one byte out and return the byte shifted in.
    fn transceive_byte(&mut self, byte: u8) -> Result<u8, Self::Error>;
}

/// [`Transport`] over an [`SpiBus`] and a chip-select [`OutputPin`].
///
/// The select pin is driven low for the duration of each datagram. The
/// bus is flushed before the pin is released so the last byte is on the
/// wire before the chip latches.
#[derive(Debug)]
pub struct SpiTransport<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> SpiTransport<SPI, CS> {
    /// Wrap an SPI bus and chip-select pin.
    ///
    /// The pin should already be de-asserted (high); the transport only
    /// toggles it around transactions.
    pub const fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    /// Release the bus and pin.
    pub fn into_inner(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

/// Failure in one half of an [`SpiTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiTransportError<SE, PE> {
    /// The SPI bus failed.
    Spi(SE),
    /// The chip-select pin failed.
    Pin(PE),
}

impl<SPI, CS> Transport for SpiTransport<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    type Error = SpiTransportError<SPI::Error, CS::Error>;

    fn chip_select(&mut self) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(SpiTransportError::Pin)
    }

    fn chip_deselect(&mut self) -> Result<(), Self::Error> {
        self.spi.flush().map_err(SpiTransportError::Spi)?;
        self.cs.set_high().map_err(SpiTransportError::Pin)
    }

    fn transceive_byte(&mut self, byte: u8) -> Result<u8, Self::Error> {
        let mut word = [byte];
        self.spi
            .transfer_in_place(&mut word)
            .map_err(SpiTransportError::Spi)?;
        Ok(word[0])
    }
}
