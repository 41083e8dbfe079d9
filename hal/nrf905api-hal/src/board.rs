//! Board facade
//!
//! [`Board`] is the one handle upstream radio logic talks to. It owns the
//! target's GPIO port, the SPI engine, the NVRAM working copy and the
//! runtime collaborators, and adds the board-level rules on top:
//!
//! - the on-board LED is addressed by logical state, whatever its wiring
//! - an unrouted carrier-detect line reads low without touching hardware
//! - detaching a reserved interrupt line only reaches the platform when a
//!   handler is attached
//!
//! The backend is picked at build time through the [`Platform`] marker, so
//! every call is statically dispatched.

use crate::config::BoardPins;
use crate::error::Result;
use crate::gpio::{Edge, GpioPort, InterruptHandler, Level, PinMode};
use crate::interrupt::{AttachmentRecord, ReservedLine};
use crate::nvram::{NvBackend, NvRam};
use crate::spi::{BitOrder, ChipSelectLevel, Mode, SpiEngine, SpiHost, SpiPins};
use crate::system::{FlashCheck, FlashMode, MemoryStats, Network, RestartReport, SystemInfo};

/// Component types of one target
pub trait Platform {
    type Gpio: GpioPort;
    type Spi: SpiHost;
    type Storage: NvBackend;
    type System: SystemInfo;
    type Network: Network;
}

/// Initialized target components, handed to [`Board::new`]
pub struct Parts<P: Platform> {
    pub gpio: P::Gpio,
    pub spi: P::Spi,
    pub storage: P::Storage,
    pub system: P::System,
    pub network: P::Network,
}

/// The physical device
///
/// `N` is the size of the persistent storage region in bytes.
pub struct Board<P: Platform, const N: usize> {
    gpio: P::Gpio,
    spi: SpiEngine<P::Spi>,
    nvram: NvRam<P::Storage, N>,
    system: P::System,
    network: P::Network,
    pins: BoardPins,
    led: bool,
    irq: AttachmentRecord,
}

impl<P: Platform, const N: usize> Board<P, N> {
    /// Take ownership of the target components
    ///
    /// Loads the NVRAM working copy and switches the LED off.
    pub fn new(parts: Parts<P>, pins: BoardPins) -> Self {
        let mut board = Self {
            gpio: parts.gpio,
            spi: SpiEngine::new(parts.spi),
            nvram: NvRam::new(parts.storage),
            system: parts.system,
            network: parts.network,
            pins,
            led: false,
            irq: AttachmentRecord::new(pins.carrier_detect, pins.data_ready),
        };
        board.gpio.set_pin_mode(pins.led, PinMode::Output);
        board.set_led(false);

        info!("Board up: {} @ {} Hz", board.system.arch(), board.system.cpu_freq_hz());
        board
    }

    /// Give the components back, dropping the NVRAM working copy
    pub fn into_parts(self) -> (Parts<P>, BoardPins) {
        let parts = Parts {
            gpio: self.gpio,
            spi: self.spi.into_host(),
            storage: self.nvram.into_backend(),
            system: self.system,
            network: self.network,
        };
        (parts, self.pins)
    }

    pub fn pins(&self) -> &BoardPins {
        &self.pins
    }

    pub fn gpio(&self) -> &P::Gpio {
        &self.gpio
    }

    /// Direct port access, e.g. for servicing interrupts from the main loop
    pub fn gpio_mut(&mut self) -> &mut P::Gpio {
        &mut self.gpio
    }

    pub fn spi(&self) -> &SpiEngine<P::Spi> {
        &self.spi
    }

    pub fn nvram(&self) -> &NvRam<P::Storage, N> {
        &self.nvram
    }

    pub fn nvram_mut(&mut self) -> &mut NvRam<P::Storage, N> {
        &mut self.nvram
    }

    pub fn system(&self) -> &P::System {
        &self.system
    }

    pub fn network(&self) -> &P::Network {
        &self.network
    }

    // ---- GPIO ----

    pub fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        self.gpio.set_pin_mode(pin, mode);
    }

    pub fn write_pin(&mut self, pin: u8, level: Level) {
        self.gpio.write_pin(pin, level);
    }

    /// Sample a pin
    ///
    /// Known limitation: on boards where carrier-detect is not wired, that
    /// pin always reads low and the hardware is never sampled.
    pub fn read_pin(&mut self, pin: u8) -> Level {
        if pin == self.pins.carrier_detect && !self.pins.carrier_detect_routed {
            return Level::Low;
        }
        self.gpio.read_pin(pin)
    }

    /// Logical LED state
    pub fn led(&self) -> bool {
        self.led
    }

    pub fn set_led(&mut self, on: bool) {
        self.led = on;
        let level = Level::from(on != self.pins.led_active_low);
        self.gpio.write_pin(self.pins.led, level);
    }

    /// Register `handler` for `edge` on `pin`
    ///
    /// See [`InterruptHandler`] for what a handler may do. An unwired
    /// carrier-detect line never gets a handler.
    pub fn attach_interrupt(&mut self, pin: u8, handler: InterruptHandler, edge: Edge) {
        if pin == self.pins.carrier_detect && !self.pins.carrier_detect_routed {
            warn!("CD pin {} is not wired, handler not attached", pin);
            return;
        }
        self.gpio.attach_interrupt(pin, handler, edge);
        if let Some(line) = self.irq.line(pin) {
            self.irq.set_attached(line, true);
            debug!("{} handler attached on pin {}", line, pin);
        }
    }

    /// Unregister the handler on `pin`
    ///
    /// A no-op for a reserved line with nothing attached. Other pins always
    /// forward to the port.
    pub fn detach_interrupt(&mut self, pin: u8) {
        match self.irq.line(pin) {
            Some(line) if self.irq.is_attached(line) => {
                self.gpio.detach_interrupt(pin);
                self.irq.set_attached(line, false);
                debug!("{} handler detached from pin {}", line, pin);
            }
            Some(_) => {}
            None => self.gpio.detach_interrupt(pin),
        }
    }

    pub fn is_interrupt_attached(&self, line: ReservedLine) -> bool {
        self.irq.is_attached(line)
    }

    // ---- SPI ----

    /// Claim the SPI bus; chip-select starts active-low
    pub fn spi_begin(&mut self, pins: SpiPins) -> Result<()> {
        self.spi.begin(&mut self.gpio, pins)
    }

    pub fn spi_end(&mut self) {
        self.spi.end();
    }

    pub fn spi_set_chip_select_polarity(&mut self, cs: u8, active: ChipSelectLevel) {
        self.spi.set_chip_select_polarity(&mut self.gpio, cs, active);
    }

    pub fn spi_set_bit_order(&mut self, order: BitOrder) {
        self.spi.set_bit_order(order);
    }

    pub fn spi_set_data_mode(&mut self, mode: Mode) {
        self.spi.set_data_mode(mode);
    }

    pub fn spi_set_frequency(&mut self, frequency: u32) {
        self.spi.set_frequency(frequency);
    }

    pub fn spi_transfer(&mut self, out: u8) -> Result<u8> {
        self.spi.transfer_byte(&mut self.gpio, out)
    }

    /// Exchange `buffer` in place as one unbroken burst
    pub fn spi_transfer_buffer(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.spi.transfer(&mut self.gpio, buffer)
    }

    // ---- NVRAM ----

    pub fn read_nvram(&self, buffer: &mut [u8], offset: usize) -> Result<()> {
        self.nvram.read(buffer, offset)
    }

    /// Stage `data` at `offset`. Lost on reset unless committed.
    pub fn write_nvram(&mut self, data: &[u8], offset: usize) -> Result<()> {
        self.nvram.write(data, offset)
    }

    pub fn clear_nvram(&mut self) {
        self.nvram.clear();
    }

    pub fn commit_nvram(&mut self) -> Result<()> {
        self.nvram.commit()
    }

    // ---- System ----

    pub fn arch(&self) -> &'static str {
        self.system.arch()
    }

    pub fn restart_reason(&self) -> RestartReport {
        RestartReport {
            cpu0: self.system.reset_reason(),
        }
    }

    pub fn cpu_freq_hz(&self) -> u32 {
        self.system.cpu_freq_hz()
    }

    pub fn sdk_version(&self) -> &'static str {
        self.system.sdk_version()
    }

    pub fn core_version(&self) -> &'static str {
        self.system.core_version()
    }

    pub fn core_revision(&self) -> Option<u32> {
        self.system.core_revision()
    }

    pub fn cpu_id(&self) -> u64 {
        self.system.cpu_id()
    }

    pub fn flash_chip_id(&self) -> Option<u32> {
        self.system.flash_chip_id()
    }

    pub fn flash_chip_size(&self) -> u32 {
        self.system.flash_chip_size()
    }

    /// Flash size the firmware was built for
    pub fn flash_chip_configured_size(&self) -> u32 {
        self.system.flash_chip_configured_size()
    }

    /// Bytes of flash taken by the firmware image
    pub fn sketch_size(&self) -> Option<u32> {
        self.system.sketch_space().map(|s| s.used)
    }

    /// Bytes of flash a larger firmware image could still grow into
    pub fn free_sketch_space(&self) -> Option<u32> {
        self.system.sketch_space().map(|s| s.free)
    }

    /// CRC-32 of the firmware image
    pub fn sketch_checksum(&self) -> Option<u32> {
        self.system.sketch_checksum()
    }

    /// Build time in seconds since the Unix epoch
    pub fn build_timestamp(&self) -> Option<u64> {
        self.system.build_timestamp()
    }

    pub fn flash_chip_speed(&self) -> Option<u32> {
        self.system.flash_chip_speed()
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.system.flash_mode()
    }

    /// Firmware image check. `Unchecked` is not a pass.
    pub fn check_flash(&mut self) -> FlashCheck {
        self.system.flash_check()
    }

    pub fn supply_millivolts(&mut self) -> Option<u16> {
        self.system.supply_millivolts()
    }

    pub fn memory(&self) -> Option<MemoryStats> {
        self.system.memory()
    }

    pub fn free_heap(&self) -> Option<u32> {
        self.memory().map(|m| m.free)
    }

    pub fn heap_fragmentation(&self) -> Option<u8> {
        self.memory().map(|m| m.fragmentation)
    }

    pub fn heap_max_free_block(&self) -> Option<u32> {
        self.memory().map(|m| m.largest_free_block)
    }

    pub fn restart(&mut self) -> ! {
        info!("Restart requested");
        self.system.restart()
    }

    /// Power down for `micros`, then restart
    pub fn deep_sleep(&mut self, micros: u64) -> ! {
        info!("Deep sleep for {} us", micros);
        self.system.deep_sleep(micros)
    }

    // ---- Network ----

    pub fn hostname(&self) -> &str {
        self.network.hostname()
    }

    pub fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        self.network.set_hostname(hostname)
    }

    /// Link-local IPv6 address, `Unsupported` where the target has none
    pub fn local_ipv6(&self) -> Result<core::net::Ipv6Addr> {
        self.network.local_ipv6()
    }

    pub fn enable_ipv6(&mut self) -> bool {
        self.network.enable_ipv6()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HalError;
    use crate::mock::{self, Event, EventLog, MockPlatform};
    use crate::nvram::ERASED;
    use crate::spi::SpiSettings;
    use crate::system::{image_checksum, ResetReason};
    use core::cell::RefCell;
    use core::sync::atomic::{AtomicU32, Ordering};

    const NVRAM_SIZE: usize = 128;

    type TestBoard<'a> = Board<MockPlatform<'a>, NVRAM_SIZE>;

    const PINS: BoardPins = BoardPins {
        led: 2,
        address_match: 32,
        carrier_detect: 33,
        chip_enable: 27,
        data_ready: 35,
        power: 26,
        tx_enable: 25,
        mosi: 13,
        miso: 12,
        sck: 14,
        cs: 15,
        led_active_low: false,
        carrier_detect_routed: true,
    };

    fn board(log: &RefCell<EventLog>, pins: BoardPins) -> TestBoard<'_> {
        Board::new(mock::parts(log), pins)
    }

    fn detaches(log: &RefCell<EventLog>, pin: u8) -> usize {
        log.borrow()
            .iter()
            .filter(|e| **e == Event::Detach(pin))
            .count()
    }

    #[test]
    fn test_new_switches_led_off() {
        let log = RefCell::new(EventLog::new());
        let board = board(&log, PINS);

        assert!(!board.led());
        assert_eq!(board.gpio().mode(2), Some(PinMode::Output));
        assert_eq!(board.gpio().level(2), Level::Low);
    }

    #[test]
    fn test_led_active_low() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(
            &log,
            BoardPins {
                led_active_low: true,
                ..PINS
            },
        );
        assert_eq!(board.gpio().level(2), Level::High);

        board.set_led(true);
        assert!(board.led());
        assert_eq!(board.gpio().level(2), Level::Low);

        board.set_led(false);
        assert!(!board.led());
        assert_eq!(board.gpio().level(2), Level::High);
    }

    #[test]
    fn test_led_active_high() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.set_led(true);
        assert_eq!(board.gpio().level(2), Level::High);
    }

    #[test]
    fn test_unrouted_carrier_detect_reads_low() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(
            &log,
            BoardPins {
                carrier_detect_routed: false,
                ..PINS
            },
        );
        board.gpio_mut().set_input(33, Level::High);
        board.gpio_mut().set_input(35, Level::High);
        log.borrow_mut().clear();

        assert_eq!(board.read_pin(33), Level::Low);
        assert!(!log.borrow().contains(&Event::Read(33)));

        // Other pins are sampled
        assert_eq!(board.read_pin(35), Level::High);
        assert!(log.borrow().contains(&Event::Read(35)));
    }

    #[test]
    fn test_routed_carrier_detect_is_sampled() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.gpio_mut().set_input(33, Level::High);

        assert_eq!(board.read_pin(33), Level::High);
    }

    fn noop() {}

    #[test]
    fn test_detach_unattached_reserved_is_noop() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.detach_interrupt(33);
        board.detach_interrupt(35);

        assert_eq!(detaches(&log, 33), 0);
        assert_eq!(detaches(&log, 35), 0);
        assert!(!board.is_interrupt_attached(ReservedLine::CarrierDetect));
        assert!(!board.is_interrupt_attached(ReservedLine::DataReady));
    }

    #[test]
    fn test_reserved_attach_detach_once() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.attach_interrupt(35, noop, Edge::Rising);
        assert!(board.is_interrupt_attached(ReservedLine::DataReady));
        assert!(!board.is_interrupt_attached(ReservedLine::CarrierDetect));
        assert!(log.borrow().contains(&Event::Attach(35, Edge::Rising)));

        board.detach_interrupt(35);
        board.detach_interrupt(35);

        assert_eq!(detaches(&log, 35), 1);
        assert!(!board.is_interrupt_attached(ReservedLine::DataReady));
    }

    #[test]
    fn test_reattach_reserved_keeps_record() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.attach_interrupt(33, noop, Edge::Rising);
        board.attach_interrupt(33, noop, Edge::Change);
        assert!(board.is_interrupt_attached(ReservedLine::CarrierDetect));

        board.detach_interrupt(33);
        assert_eq!(detaches(&log, 33), 1);
    }

    #[test]
    fn test_other_pin_detach_always_forwards() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.detach_interrupt(32);
        board.detach_interrupt(32);

        assert_eq!(detaches(&log, 32), 2);
    }

    static DATA_READY_HITS: AtomicU32 = AtomicU32::new(0);

    fn on_data_ready() {
        DATA_READY_HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_data_ready_handler_fires() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.attach_interrupt(35, on_data_ready, Edge::Rising);

        board.gpio_mut().service_interrupts();
        board.gpio_mut().set_input(35, Level::High);
        board.gpio_mut().service_interrupts();
        assert_eq!(DATA_READY_HITS.load(Ordering::Relaxed), 1);

        board.detach_interrupt(35);
        board.gpio_mut().set_input(35, Level::Low);
        board.gpio_mut().service_interrupts();
        board.gpio_mut().set_input(35, Level::High);
        board.gpio_mut().service_interrupts();
        assert_eq!(DATA_READY_HITS.load(Ordering::Relaxed), 1);
    }

    static CARRIER_HITS: AtomicU32 = AtomicU32::new(0);

    fn on_carrier() {
        CARRIER_HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_unrouted_carrier_detect_never_attaches() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(
            &log,
            BoardPins {
                carrier_detect_routed: false,
                ..PINS
            },
        );
        board.attach_interrupt(33, on_carrier, Edge::Rising);

        assert!(!board.is_interrupt_attached(ReservedLine::CarrierDetect));
        assert!(!log.borrow().contains(&Event::Attach(33, Edge::Rising)));

        // A floating input going high reaches no handler
        board.gpio_mut().service_interrupts();
        board.gpio_mut().set_input(33, Level::High);
        board.gpio_mut().service_interrupts();
        assert_eq!(CARRIER_HITS.load(Ordering::Relaxed), 0);

        board.detach_interrupt(33);
        assert_eq!(detaches(&log, 33), 0);
    }

    #[test]
    fn test_spi_scenario() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.spi_begin(PINS.spi_pins()).unwrap();
        board.spi_set_frequency(1_000_000);
        board.spi_set_bit_order(BitOrder::MsbFirst);
        board.spi_set_data_mode(Mode::Mode0);
        board.spi_set_chip_select_polarity(15, ChipSelectLevel::ActiveLow);
        log.borrow_mut().clear();

        board.spi_transfer(0xAA).unwrap();

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
    fn test_spi_end_then_transfer_rejected() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.spi_begin(PINS.spi_pins()).unwrap();
        board.spi_end();

        assert!(!board.spi().is_claimed());
        assert_eq!(board.spi_transfer(0x00), Err(HalError::BusNotClaimed));
        assert!(log.borrow().contains(&Event::Release));
    }

    #[test]
    fn test_nvram_survives_reset() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.write_nvram(b"radio", 0).unwrap();
        board.commit_nvram().unwrap();
        board.write_nvram(b"lost", 16).unwrap();

        let (parts, pins) = board.into_parts();
        let board: TestBoard<'_> = Board::new(parts, pins);

        let mut buf = [0u8; 5];
        board.read_nvram(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"radio");

        let mut buf = [0u8; 4];
        board.read_nvram(&mut buf, 16).unwrap();
        assert_eq!(buf, [ERASED; 4]);
    }

    #[test]
    fn test_nvram_clear() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.write_nvram(&[0x00; 8], 120).unwrap();

        board.clear_nvram();

        let mut buf = [0u8; NVRAM_SIZE];
        board.read_nvram(&mut buf, 0).unwrap();
        assert!(buf.iter().all(|&b| b == ERASED));
        assert_eq!(board.write_nvram(&[0; 9], 120), Err(HalError::OutOfRange));
    }

    #[test]
    fn test_restart_reason_report() {
        let log = RefCell::new(EventLog::new());
        let mut parts = mock::parts(&log);
        parts.system.set_reset_reason(ResetReason::Watchdog);
        let board: TestBoard<'_> = Board::new(parts, PINS);

        assert_eq!(
            board.restart_reason(),
            RestartReport {
                cpu0: ResetReason::Watchdog
            }
        );
        assert_eq!(board.system().reset_reason(), ResetReason::Watchdog);
    }

    #[test]
    fn test_system_forwards() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        assert_eq!(board.arch(), "mock");
        assert_eq!(board.cpu_freq_hz(), 80_000_000);
        assert_eq!(board.check_flash(), FlashCheck::Unchecked);
        assert_eq!(board.free_heap(), Some(40_000));
        assert_eq!(board.heap_max_free_block(), Some(30_000));
        assert_eq!(board.heap_fragmentation(), Some(25));
        assert_eq!(board.flash_chip_id(), None);
    }

    #[test]
    fn test_firmware_identity() {
        let log = RefCell::new(EventLog::new());
        let board = board(&log, PINS);
        let image_len = mock::MOCK_IMAGE.len() as u32;

        assert_eq!(board.flash_chip_size(), 4 * 1024 * 1024);
        assert_eq!(board.flash_chip_configured_size(), 1024 * 1024);
        assert_eq!(board.sketch_size(), Some(image_len));
        assert_eq!(
            board.free_sketch_space(),
            Some(mock::MOCK_SKETCH_LIMIT - image_len)
        );
        assert_eq!(
            board.sketch_checksum(),
            Some(image_checksum(mock::MOCK_IMAGE))
        );
        // No build time recorded
        assert_eq!(board.build_timestamp(), None);
    }

    #[test]
    #[should_panic(expected = "restart")]
    fn test_restart_reaches_platform() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);
        board.restart();
    }

    #[test]
    fn test_hostname() {
        let log = RefCell::new(EventLog::new());
        let mut board = board(&log, PINS);

        board.set_hostname("nrf905-gw").unwrap();
        assert_eq!(board.hostname(), "nrf905-gw");
        assert_eq!(board.network().hostname(), "nrf905-gw");
        assert_eq!(
            board.set_hostname("a-hostname-that-is-far-too-long-to-keep"),
            Err(HalError::OutOfRange)
        );
        assert!(!board.enable_ipv6());
    }

    #[test]
    fn test_ipv6_unsupported() {
        let log = RefCell::new(EventLog::new());
        let board = board(&log, PINS);
        assert_eq!(board.local_ipv6(), Err(HalError::Unsupported));
    }
}
