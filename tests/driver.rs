//! Drive the full stack through a recording transport.
//!
//! The mock stands in for the SPI link and records each chip-select
//! bracketed transaction as the byte triple that went over the wire, so
//! the commit ordering and idempotence guarantees are directly
//! assertable. Replies are programmable to exercise the readback decode.

use tmc26x_hal::{ConfigError, Error, MotorProfile, Register, Tmc26x, Transport};

/// Injected wire failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WireFault;

#[derive(Default)]
struct RecordingTransport {
    /// Completed transactions, one `Vec` of outgoing bytes each.
    transactions: Vec<Vec<u8>>,
    /// Bytes of the transaction currently in flight.
    current: Vec<u8>,
    /// Bytes clocked back to the driver, per byte position.
    reply: [u8; 3],
    /// Fail the first byte of the transaction with this index.
    fail_at_transaction: Option<usize>,
    selected: bool,
}

impl RecordingTransport {
    fn new() -> Self {
        Self::default()
    }

    /// First outgoing byte of every recorded transaction; the top nibble
    /// identifies the register.
    fn leading_bytes(&self) -> Vec<u8> {
        self.transactions.iter().map(|tx| tx[0]).collect()
    }
}

impl Transport for RecordingTransport {
    type Error = WireFault;

    fn chip_select(&mut self) -> Result<(), WireFault> {
        assert!(!self.selected, "chip select while already selected");
        self.selected = true;
        self.current.clear();
        Ok(())
    }

    fn chip_deselect(&mut self) -> Result<(), WireFault> {
        assert!(self.selected, "chip deselect while not selected");
        self.selected = false;
        if !self.current.is_empty() {
            self.transactions.push(std::mem::take(&mut self.current));
        }
        Ok(())
    }

    fn transceive_byte(&mut self, byte: u8) -> Result<u8, WireFault> {
        if self.fail_at_transaction == Some(self.transactions.len()) && self.current.is_empty() {
            return Err(WireFault);
        }
        let position = self.current.len();
        self.current.push(byte);
        Ok(self.reply[position.min(2)])
    }
}

fn datagram(raw: u32) -> Vec<u8> {
    let [_, high, mid, low] = raw.to_be_bytes();
    vec![high, mid, low]
}

/// 75 mOhm sense resistors throughout, matching the reference board.
const RSENSE_MOHM: u16 = 75;

#[test]
fn profile_initialization_commits_every_register_once() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    assert!(driver.configuration().is_fully_specified());
    assert!(!driver.configuration().is_dirty());

    // DRVCONF, SGCSCONF, DRVCTRL, CHOPCONF, SMARTEN: the plain commit
    // precedence, identified by the address nibble in the leading byte.
    assert_eq!(
        driver.into_inner().leading_bytes(),
        [0x0E, 0x0C, 0x00, 0x08, 0x0A]
    );
}

#[test]
fn committing_twice_transmits_nothing_the_second_time() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    driver.commit(false).unwrap();
    driver.commit(true).unwrap();
    assert_eq!(driver.into_inner().transactions.len(), 5);
}

#[test]
fn commit_refuses_a_partially_specified_configuration() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    assert_eq!(
        driver.commit(false),
        Err(Error::Config(ConfigError::InvalidConfig))
    );

    driver.configuration_mut().set_test_mode(true);
    driver.configuration_mut().set_current_scale(16).unwrap();
    assert_eq!(
        driver.commit(false),
        Err(Error::Config(ConfigError::InvalidConfig))
    );

    assert!(driver.into_inner().transactions.is_empty());
}

#[test]
fn raising_the_sense_voltage_sends_the_current_scale_first() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    // Driving current 2000 mA needs the 305 mV range at 75 mOhm.
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    // Dropping to the 250 mA stationary current moves to 165 mV; no
    // special ordering, DRVCONF leads as usual.
    driver.apply_stationary_current().unwrap();
    // 250 mA at 165 mV / 75 mOhm is CS code 5, stored as 4, alongside the
    // profile's stallGuard threshold of 16.
    {
        let sgcsconf = driver.configuration().register(Register::SgcsConf);
        assert_eq!(sgcsconf, 0xC1004);
    }

    // Back to the driving current: the sense voltage rises, so SGCSCONF
    // must hit the wire strictly before DRVCONF.
    driver.apply_driving_current().unwrap();

    let transport = driver.into_inner();
    let leading = transport.leading_bytes();
    assert_eq!(leading[5..7], [0x0E, 0x0C], "lowering commits DRVCONF first");
    assert_eq!(leading[7..9], [0x0C, 0x0E], "raising commits SGCSCONF first");
}

#[test]
fn transport_failure_keeps_exactly_the_unsent_registers_dirty() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    let config = driver.configuration_mut();
    config.set_off_time(2).unwrap();
    config.set_test_mode(true);

    // DRVCONF goes out first; fail the CHOPCONF transaction after it.
    driver.transport_mut().fail_at_transaction = Some(6);
    assert_eq!(driver.commit(false), Err(Error::Transport(WireFault)));
    assert!(!driver.configuration().is_register_dirty(Register::DrvConf));
    assert!(driver.configuration().is_register_dirty(Register::ChopConf));

    // The retry resends only the outstanding register.
    driver.transport_mut().fail_at_transaction = None;
    driver.commit(false).unwrap();
    assert!(!driver.configuration().is_dirty());

    let chopconf = driver.configuration().register(Register::ChopConf);
    let transport = driver.into_inner();
    assert_eq!(transport.transactions.len(), 7);
    assert_eq!(transport.transactions[6], datagram(chopconf));
}

#[test]
fn readback_reuses_a_committed_matching_channel() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();
    driver.transport_mut().reply = [0xAB, 0xCD, 0xEF];

    // The profile leaves stallGuard selected and committed: the read is a
    // single transaction carrying the current DRVCONF value.
    let drvconf = driver.configuration().register(Register::DrvConf);
    let value = driver.read_stall_guard().unwrap();
    // Reply 0xABCDEF minus the status nibble is 0xABCDE; stallGuard takes
    // the top 10 bits.
    assert_eq!(value, 0x2AF);
    {
        let transport = driver.transport_mut();
        assert_eq!(transport.transactions.len(), 6);
        assert_eq!(transport.transactions[5], datagram(drvconf));
    }

    // A different channel needs a DRVCONF write before the read.
    let value = driver.read_cool_step().unwrap();
    assert_eq!(value, 0x0F);
    assert_eq!(driver.transport_mut().transactions.len(), 8);

    let value = driver.read_micro_step().unwrap();
    assert_eq!(value, 0x2AF);
    assert_eq!(driver.transport_mut().transactions.len(), 10);

    // Same channel again, nothing dirty: single transaction.
    driver.read_micro_step().unwrap();
    assert_eq!(driver.into_inner().transactions.len(), 11);
}

#[test]
fn dirty_registers_are_flushed_before_a_channel_read() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    // Channel already matches, but a pending CHOPCONF change must reach
    // the chip before the measurement is trusted.
    driver.configuration_mut().set_off_time(3).unwrap();
    driver.read_stall_guard().unwrap();

    let transport = driver.into_inner();
    // Commit of DRVCONF + CHOPCONF, then the readback transaction.
    assert_eq!(
        transport.leading_bytes()[5..],
        [0x0E, 0x08, 0x0E],
        "pending configuration must be committed before reading"
    );
}

#[test]
fn raw_reads_neither_select_a_channel_nor_commit() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();
    driver.transport_mut().reply = [0xAB, 0xCD, 0xEF];

    driver.configuration_mut().set_test_mode(true);
    let value = driver.read_raw().unwrap();
    // Bits 4..=19 of the 20-bit reply.
    assert_eq!(value, 0xABCD);
    assert!(driver.configuration().is_register_dirty(Register::DrvConf));
    assert_eq!(driver.into_inner().transactions.len(), 6);
}

#[test]
fn over_range_current_requests_leave_the_chip_untouched() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    // 6 A is beyond CS code 32 even at the 305 mV range with 75 mOhm.
    assert_eq!(
        driver.set_full_scale_current(6000),
        Err(Error::Config(ConfigError::InvalidValue))
    );
    assert!(!driver.configuration().is_dirty());
    assert_eq!(driver.into_inner().transactions.len(), 5);
}

#[test]
fn ground_short_protection_is_inverted_on_the_wire() {
    let mut driver = Tmc26x::new(RecordingTransport::new(), RSENSE_MOHM);
    driver
        .initialize_with_profile(MotorProfile::Longs23Hs7430)
        .unwrap();

    // The profile enables protection; the DISGGRD-style hardware bit must
    // therefore be zero in the transmitted DRVCONF.
    let transport = driver.into_inner();
    let drvconf_bytes = &transport.transactions[0];
    let raw = (u32::from(drvconf_bytes[0]) << 16)
        | (u32::from(drvconf_bytes[1]) << 8)
        | u32::from(drvconf_bytes[2]);
    assert_eq!(raw & (1 << 10), 0);
}
