//! SPI transaction engine
//!
//! [`SpiEngine`] owns the bus configuration and brackets every transfer:
//!
//! 1. assert chip-select at the current active level
//! 2. open a bus transaction with the stored settings
//! 3. exchange the bytes in one burst
//! 4. close the transaction
//! 5. deassert chip-select
//!
//! Chip-select is a plain GPIO driven by the engine, so the target's
//! [`SpiHost`] only deals with clock, mode and data.
//!
//! The engine is not reentrant. Calling it from an interrupt handler while
//! the main flow is inside a transfer corrupts chip-select state.

use crate::error::{HalError, Result};
use crate::gpio::{GpioPort, Level, PinMode};

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI data mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Build from the numeric mode 0..=3
    pub fn from_u8(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Level at which the peripheral is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipSelectLevel {
    /// Selected while CS is low
    #[default]
    ActiveLow,
    /// Selected while CS is high
    ActiveHigh,
}

impl ChipSelectLevel {
    /// Pin level that selects the peripheral
    pub fn asserted(self) -> Level {
        match self {
            ChipSelectLevel::ActiveLow => Level::Low,
            ChipSelectLevel::ActiveHigh => Level::High,
        }
    }

    /// Resting pin level
    pub fn deasserted(self) -> Level {
        !self.asserted()
    }
}

/// Pins claimed by [`SpiEngine::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiPins {
    pub mosi: u8,
    pub miso: u8,
    pub clk: u8,
    pub cs: u8,
}

/// Settings applied for one bus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiSettings {
    /// Clock frequency in Hz
    pub frequency: u32,
    pub bit_order: BitOrder,
    pub mode: Mode,
}

/// Target SPI peripheral
///
/// Implementations only move data; chip-select is handled by [`SpiEngine`].
pub trait SpiHost {
    /// Claim the peripheral and route it to `pins`
    ///
    /// Fails with [`HalError::BusInUse`] if already claimed, or
    /// [`HalError::InvalidPin`] if the pins cannot be routed to the peripheral.
    fn claim(&mut self, pins: SpiPins) -> Result<()>;

    /// Release the peripheral. Must be harmless when nothing is claimed.
    fn release(&mut self);

    /// Apply `settings` for the following exchange
    fn begin_transaction(&mut self, settings: &SpiSettings) -> Result<()>;

    /// Full-duplex exchange in place, as one unbroken burst
    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()>;

    /// Finish the transaction started by `begin_transaction`
    fn end_transaction(&mut self);
}

/// Stored bus configuration
///
/// Frequency, bit order and data mode start unset and must each be set
/// before the first transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiBusConfig {
    pub frequency: Option<u32>,
    pub bit_order: Option<BitOrder>,
    pub mode: Option<Mode>,
    pub cs: Option<u8>,
    pub cs_active: ChipSelectLevel,
}

impl SpiBusConfig {
    /// Settings for a transfer, if fully configured
    pub fn settings(&self) -> Option<SpiSettings> {
        Some(SpiSettings {
            frequency: self.frequency?,
            bit_order: self.bit_order?,
            mode: self.mode?,
        })
    }
}

/// SPI transaction engine
pub struct SpiEngine<S> {
    host: S,
    config: SpiBusConfig,
    claimed: bool,
}

impl<S: SpiHost> SpiEngine<S> {
    pub fn new(host: S) -> Self {
        Self {
            host,
            config: SpiBusConfig::default(),
            claimed: false,
        }
    }

    /// Current bus configuration
    pub fn config(&self) -> &SpiBusConfig {
        &self.config
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    pub fn host(&self) -> &S {
        &self.host
    }

    pub fn into_host(self) -> S {
        self.host
    }

    /// Claim the bus and park chip-select at its inactive level
    ///
    /// Resets the chip-select polarity to active-low until
    /// [`set_chip_select_polarity`](Self::set_chip_select_polarity) is called.
    pub fn begin<G: GpioPort>(&mut self, gpio: &mut G, pins: SpiPins) -> Result<()> {
        if self.claimed {
            warn!("SPI begin while already claimed");
            return Err(HalError::BusInUse);
        }
        self.host.claim(pins)?;
        self.claimed = true;
        self.config.cs = Some(pins.cs);
        self.config.cs_active = ChipSelectLevel::ActiveLow;

        gpio.set_pin_mode(pins.cs, PinMode::Output);
        gpio.write_pin(pins.cs, self.config.cs_active.deasserted());
        debug!(
            "SPI claimed: mosi={} miso={} clk={} cs={}",
            pins.mosi, pins.miso, pins.clk, pins.cs
        );
        Ok(())
    }

    /// Release the bus. Safe to call without a prior `begin`.
    pub fn end(&mut self) {
        if self.claimed {
            self.host.release();
            self.claimed = false;
            debug!("SPI released");
        }
    }

    /// Set chip-select polarity and drive `cs` to its new resting level
    ///
    /// `cs` becomes the engine's chip-select line.
    pub fn set_chip_select_polarity<G: GpioPort>(
        &mut self,
        gpio: &mut G,
        cs: u8,
        active: ChipSelectLevel,
    ) {
        self.config.cs = Some(cs);
        self.config.cs_active = active;
        gpio.write_pin(cs, active.deasserted());
    }

    pub fn set_bit_order(&mut self, order: BitOrder) {
        self.config.bit_order = Some(order);
    }

    pub fn set_data_mode(&mut self, mode: Mode) {
        self.config.mode = Some(mode);
    }

    /// Set clock frequency in Hz
    pub fn set_frequency(&mut self, frequency: u32) {
        self.config.frequency = Some(frequency);
    }

    /// Exchange one byte
    pub fn transfer_byte<G: GpioPort>(&mut self, gpio: &mut G, out: u8) -> Result<u8> {
        let mut word = [out];
        self.transfer(gpio, &mut word)?;
        Ok(word[0])
    }

    /// Exchange `buffer` in place within a single transaction
    ///
    /// An empty buffer still pulses chip-select but skips the bus.
    pub fn transfer<G: GpioPort>(&mut self, gpio: &mut G, buffer: &mut [u8]) -> Result<()> {
        if !self.claimed {
            return Err(HalError::BusNotClaimed);
        }
        let (cs, settings) = match (self.config.cs, self.config.settings()) {
            (Some(cs), Some(settings)) => (cs, settings),
            _ => return Err(HalError::BusNotConfigured),
        };
        let active = self.config.cs_active;

        gpio.write_pin(cs, active.asserted());
        let result = if buffer.is_empty() {
            Ok(())
        } else {
            self.exchange(&settings, buffer)
        };
        gpio.write_pin(cs, active.deasserted());

        result
    }

    fn exchange(&mut self, settings: &SpiSettings, buffer: &mut [u8]) -> Result<()> {
        self.host.begin_transaction(settings)?;
        let result = self.host.transfer_in_place(buffer);
        self.host.end_transaction();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, EventLog, MockGpio, MockSpi};
    use core::cell::RefCell;
    use proptest::prelude::*;

    const PINS: SpiPins = SpiPins {
        mosi: 13,
        miso: 12,
        clk: 14,
        cs: 15,
    };

    fn configure(engine: &mut SpiEngine<MockSpi<'_>>) {
        engine.set_frequency(1_000_000);
        engine.set_bit_order(BitOrder::MsbFirst);
        engine.set_data_mode(Mode::Mode0);
    }

    #[test]
    fn test_mode_conversion() {
        assert_eq!(Mode::from_u8(2), Some(Mode::Mode2));
        assert_eq!(Mode::from_u8(4), None);
        let (pol, pha): (Polarity, Phase) = Mode::Mode3.into();
        assert_eq!(pol, Polarity::IdleHigh);
        assert_eq!(pha, Phase::CaptureOnSecondTransition);
    }

    #[test]
    fn test_begin_parks_cs_high() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));

        engine.begin(&mut gpio, PINS).unwrap();

        assert!(engine.is_claimed());
        assert_eq!(engine.config().cs_active, ChipSelectLevel::ActiveLow);
        assert_eq!(gpio.level(15), Level::High);
        assert_eq!(log.borrow()[0], Event::Claim(PINS));
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));

        engine.begin(&mut gpio, PINS).unwrap();
        assert_eq!(engine.begin(&mut gpio, PINS), Err(HalError::BusInUse));
    }

    #[test]
    fn test_claim_failure_is_surfaced() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut spi = MockSpi::new(&log);
        spi.fail_claim(true);
        let mut engine = SpiEngine::new(spi);

        assert_eq!(engine.begin(&mut gpio, PINS), Err(HalError::BusInUse));
        assert!(!engine.is_claimed());
    }

    #[test]
    fn test_end_without_begin() {
        let log = RefCell::new(EventLog::new());
        let mut engine = SpiEngine::new(MockSpi::new(&log));

        engine.end();
        engine.end();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_end_releases_host_for_next_begin() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        configure(&mut engine);

        engine.begin(&mut gpio, PINS).unwrap();
        engine.end();
        assert!(!engine.host().is_claimed());

        engine.begin(&mut gpio, PINS).unwrap();
        assert!(engine.host().is_claimed());
        assert_eq!(engine.transfer_byte(&mut gpio, 0x10), Ok(0x00));

        let lifecycle: Vec<Event> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Claim(_) | Event::Release))
            .cloned()
            .collect();
        assert_eq!(
            lifecycle,
            [Event::Claim(PINS), Event::Release, Event::Claim(PINS)]
        );
    }

    #[test]
    fn test_transfer_before_begin() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        configure(&mut engine);

        assert_eq!(
            engine.transfer_byte(&mut gpio, 0xAA),
            Err(HalError::BusNotClaimed)
        );
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_transfer_before_configuration() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        engine.begin(&mut gpio, PINS).unwrap();
        engine.set_frequency(1_000_000);
        engine.set_data_mode(Mode::Mode0);
        log.borrow_mut().clear();

        assert_eq!(
            engine.transfer_byte(&mut gpio, 0xAA),
            Err(HalError::BusNotConfigured)
        );
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_single_byte_scenario() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut spi = MockSpi::new(&log);
        spi.queue_response(&[0x55]);
        let mut engine = SpiEngine::new(spi);

        engine.begin(&mut gpio, PINS).unwrap();
        configure(&mut engine);
        engine.set_chip_select_polarity(&mut gpio, 15, ChipSelectLevel::ActiveLow);
        log.borrow_mut().clear();

        let rx = engine.transfer_byte(&mut gpio, 0xAA).unwrap();

        assert_eq!(rx, 0x55);
        let settings = SpiSettings {
            frequency: 1_000_000,
            bit_order: BitOrder::MsbFirst,
            mode: Mode::Mode0,
        };
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Event::Write(15, Level::Low),
                Event::BeginTransaction(settings),
                Event::Exchange { len: 1, first: 0xAA },
                Event::EndTransaction,
                Event::Write(15, Level::High),
            ]
        );
    }

    #[test]
    fn test_buffer_is_one_transaction() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        engine.begin(&mut gpio, PINS).unwrap();
        configure(&mut engine);
        log.borrow_mut().clear();

        let mut buf = [0x10, 0x20, 0x30, 0x40];
        engine.transfer(&mut gpio, &mut buf).unwrap();

        let log = log.borrow();
        let begins = log
            .iter()
            .filter(|e| matches!(e, Event::BeginTransaction(_)))
            .count();
        assert_eq!(begins, 1);
        assert!(log.contains(&Event::Exchange { len: 4, first: 0x10 }));
    }

    #[test]
    fn test_zero_length_pulses_cs_only() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        engine.begin(&mut gpio, PINS).unwrap();
        configure(&mut engine);
        log.borrow_mut().clear();

        engine.transfer(&mut gpio, &mut []).unwrap();

        assert_eq!(
            log.borrow().as_slice(),
            &[Event::Write(15, Level::Low), Event::Write(15, Level::High)]
        );
    }

    #[test]
    fn test_bus_error_still_releases_cs() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut spi = MockSpi::new(&log);
        spi.fail_transfers(true);
        let mut engine = SpiEngine::new(spi);
        engine.begin(&mut gpio, PINS).unwrap();
        configure(&mut engine);

        assert_eq!(engine.transfer_byte(&mut gpio, 0x01), Err(HalError::Bus));
        assert_eq!(gpio.level(15), Level::High);
        assert_eq!(log.borrow().last(), Some(&Event::Write(15, Level::High)));
    }

    #[test]
    fn test_active_high_polarity() {
        let log = RefCell::new(EventLog::new());
        let mut gpio = MockGpio::new(&log);
        let mut engine = SpiEngine::new(MockSpi::new(&log));
        engine.begin(&mut gpio, PINS).unwrap();
        configure(&mut engine);

        engine.set_chip_select_polarity(&mut gpio, 15, ChipSelectLevel::ActiveHigh);
        assert_eq!(gpio.level(15), Level::Low);

        log.borrow_mut().clear();
        engine.transfer_byte(&mut gpio, 0x00).unwrap();
        let log = log.borrow();
        assert_eq!(log.first(), Some(&Event::Write(15, Level::High)));
        assert_eq!(log.last(), Some(&Event::Write(15, Level::Low)));
    }

    fn level_strategy() -> impl Strategy<Value = ChipSelectLevel> {
        prop_oneof![
            Just(ChipSelectLevel::ActiveLow),
            Just(ChipSelectLevel::ActiveHigh)
        ]
    }

    proptest! {
        #[test]
        fn prop_polarity_change_leaves_cs_inactive(level in level_strategy()) {
            let log = RefCell::new(EventLog::new());
            let mut gpio = MockGpio::new(&log);
            let mut engine = SpiEngine::new(MockSpi::new(&log));
            engine.begin(&mut gpio, PINS).unwrap();

            engine.set_chip_select_polarity(&mut gpio, 15, level);

            prop_assert_eq!(gpio.level(15), level.deasserted());
        }

        #[test]
        fn prop_each_transfer_uses_live_polarity(
            levels in proptest::collection::vec(level_strategy(), 1..8),
            out in any::<u8>(),
        ) {
            let log = RefCell::new(EventLog::new());
            let mut gpio = MockGpio::new(&log);
            let mut engine = SpiEngine::new(MockSpi::new(&log));
            engine.begin(&mut gpio, PINS).unwrap();
            configure(&mut engine);

            for level in levels {
                engine.set_chip_select_polarity(&mut gpio, 15, level);
                log.borrow_mut().clear();

                engine.transfer_byte(&mut gpio, out).unwrap();

                let log = log.borrow();
                prop_assert_eq!(log.len(), 5);
                prop_assert_eq!(log[0], Event::Write(15, level.asserted()));
                prop_assert_eq!(log[2], Event::Exchange { len: 1, first: out });
                prop_assert_eq!(log[4], Event::Write(15, level.deasserted()));
            }
        }
    }
}
