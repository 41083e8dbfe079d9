//! Recording mock platform for host tests
//!
//! GPIO and SPI fakes append to one shared [`EventLog`], so tests can assert
//! the exact interleaving of chip-select writes and bus activity.

use core::cell::RefCell;
use core::marker::PhantomData;

use heapless::{Deque, Vec};

use crate::board::{Parts, Platform};
use crate::error::{HalError, Result};
use crate::gpio::{Edge, GpioPort, InterruptHandler, Level, PinMode};
use crate::interrupt::EdgeDispatcher;
use crate::nvram::{NvBackend, ERASED};
use crate::spi::{SpiHost, SpiPins, SpiSettings};
use crate::system::{
    image_checksum, Hostname, MemoryStats, Network, ResetReason, SketchSpace, SystemInfo,
};

/// Pins addressable on the mock port
pub const MOCK_PINS: usize = 64;

/// Hardware-visible action seen by a mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Mode(u8, PinMode),
    Write(u8, Level),
    Read(u8),
    Attach(u8, Edge),
    Detach(u8),
    Claim(SpiPins),
    Release,
    BeginTransaction(SpiSettings),
    /// Bus exchange of `len` bytes, `first` being the first byte sent
    Exchange { len: usize, first: u8 },
    EndTransaction,
}

/// Shared event log. Events past capacity are dropped.
pub type EventLog = Vec<Event, 128>;

fn record(log: &RefCell<EventLog>, event: Event) {
    let _ = log.borrow_mut().push(event);
}

/// GPIO port with externally settable inputs
pub struct MockGpio<'a> {
    log: &'a RefCell<EventLog>,
    levels: [Level; MOCK_PINS],
    modes: [Option<PinMode>; MOCK_PINS],
    dispatcher: EdgeDispatcher<4>,
}

impl<'a> MockGpio<'a> {
    pub fn new(log: &'a RefCell<EventLog>) -> Self {
        Self {
            log,
            levels: [Level::Low; MOCK_PINS],
            modes: [None; MOCK_PINS],
            dispatcher: EdgeDispatcher::new(),
        }
    }

    /// Current level of `pin`, driven or external
    pub fn level(&self, pin: u8) -> Level {
        self.levels
            .get(pin as usize)
            .copied()
            .unwrap_or(Level::Low)
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(pin as usize).copied().flatten()
    }

    /// Simulate an external signal on `pin`
    pub fn set_input(&mut self, pin: u8, level: Level) {
        if let Some(slot) = self.levels.get_mut(pin as usize) {
            *slot = level;
        }
    }

    /// Run attached handlers for edges since the last call
    pub fn service_interrupts(&mut self) -> usize {
        let levels = &self.levels;
        self.dispatcher
            .service(|pin| levels.get(pin as usize).copied().unwrap_or(Level::Low))
    }
}

impl GpioPort for MockGpio<'_> {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        if let Some(slot) = self.modes.get_mut(pin as usize) {
            *slot = Some(mode);
        }
        record(self.log, Event::Mode(pin, mode));
    }

    fn write_pin(&mut self, pin: u8, level: Level) {
        self.set_input(pin, level);
        record(self.log, Event::Write(pin, level));
    }

    fn read_pin(&mut self, pin: u8) -> Level {
        record(self.log, Event::Read(pin));
        self.level(pin)
    }

    fn attach_interrupt(&mut self, pin: u8, handler: InterruptHandler, edge: Edge) {
        self.dispatcher.attach(pin, handler, edge);
        record(self.log, Event::Attach(pin, edge));
    }

    fn detach_interrupt(&mut self, pin: u8) {
        self.dispatcher.detach(pin);
        record(self.log, Event::Detach(pin));
    }
}

/// SPI host that records traffic and answers from a queue
pub struct MockSpi<'a> {
    log: &'a RefCell<EventLog>,
    claimed: bool,
    fail_claim: bool,
    fail_transfers: bool,
    responses: Deque<u8, 64>,
}

impl<'a> MockSpi<'a> {
    pub fn new(log: &'a RefCell<EventLog>) -> Self {
        Self {
            log,
            claimed: false,
            fail_claim: false,
            fail_transfers: false,
            responses: Deque::new(),
        }
    }

    /// Make `claim` report the bus as taken
    pub fn fail_claim(&mut self, fail: bool) {
        self.fail_claim = fail;
    }

    /// Make every exchange report a bus error
    pub fn fail_transfers(&mut self, fail: bool) {
        self.fail_transfers = fail;
    }

    /// Bytes clocked in by the following exchanges. Unqueued bytes read 0x00.
    pub fn queue_response(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let _ = self.responses.push_back(b);
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }
}

impl SpiHost for MockSpi<'_> {
    fn claim(&mut self, pins: SpiPins) -> Result<()> {
        if self.fail_claim || self.claimed {
            return Err(HalError::BusInUse);
        }
        self.claimed = true;
        record(self.log, Event::Claim(pins));
        Ok(())
    }

    fn release(&mut self) {
        if self.claimed {
            self.claimed = false;
            record(self.log, Event::Release);
        }
    }

    fn begin_transaction(&mut self, settings: &SpiSettings) -> Result<()> {
        record(self.log, Event::BeginTransaction(*settings));
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        record(
            self.log,
            Event::Exchange {
                len: words.len(),
                first: words.first().copied().unwrap_or(0),
            },
        );
        if !self.claimed {
            return Err(HalError::BusNotClaimed);
        }
        if self.fail_transfers {
            return Err(HalError::Bus);
        }
        for word in words.iter_mut() {
            *word = self.responses.pop_front().unwrap_or(0);
        }
        Ok(())
    }

    fn end_transaction(&mut self) {
        record(self.log, Event::EndTransaction);
    }
}

/// In-memory durable storage
pub struct MockNvBackend<const N: usize> {
    durable: [u8; N],
    stores: usize,
    fail_load: bool,
    fail_store: bool,
}

impl<const N: usize> MockNvBackend<N> {
    /// Blank (erased) storage
    pub fn new() -> Self {
        Self {
            durable: [ERASED; N],
            stores: 0,
            fail_load: false,
            fail_store: false,
        }
    }

    /// Number of successful stores
    pub fn store_count(&self) -> usize {
        self.stores
    }

    pub fn durable(&self) -> &[u8] {
        &self.durable
    }

    pub fn fail_load(&mut self, fail: bool) {
        self.fail_load = fail;
    }

    pub fn fail_store(&mut self, fail: bool) {
        self.fail_store = fail;
    }
}

impl<const N: usize> Default for MockNvBackend<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> NvBackend for MockNvBackend<N> {
    fn load(&mut self, image: &mut [u8]) -> Result<()> {
        if self.fail_load {
            return Err(HalError::Storage);
        }
        let len = image.len().min(N);
        image[..len].copy_from_slice(&self.durable[..len]);
        Ok(())
    }

    fn store(&mut self, image: &[u8]) -> Result<()> {
        if self.fail_store {
            return Err(HalError::Storage);
        }
        let len = image.len().min(N);
        self.durable[..len].copy_from_slice(&image[..len]);
        self.stores += 1;
        Ok(())
    }
}

/// Firmware image reported by [`MockSystem`]
pub const MOCK_IMAGE: &[u8] = b"nrf905api mock firmware image";

/// Flash the mock image may grow into
pub const MOCK_SKETCH_LIMIT: u32 = 64 * 1024;

/// Runtime with fixed answers
pub struct MockSystem {
    reset_reason: ResetReason,
    cpu_mhz: u32,
}

impl MockSystem {
    pub fn new() -> Self {
        Self {
            reset_reason: ResetReason::PowerOn,
            cpu_mhz: 80,
        }
    }

    pub fn set_reset_reason(&mut self, reason: ResetReason) {
        self.reset_reason = reason;
    }
}

impl Default for MockSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfo for MockSystem {
    fn arch(&self) -> &'static str {
        "mock"
    }

    fn cpu_freq_hz(&self) -> u32 {
        self.cpu_mhz * 1_000_000
    }

    fn sdk_version(&self) -> &'static str {
        "mock-sdk"
    }

    fn core_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn cpu_id(&self) -> u64 {
        0x0905_0905
    }

    fn flash_chip_id(&self) -> Option<u32> {
        None
    }

    fn flash_chip_size(&self) -> u32 {
        4 * 1024 * 1024
    }

    fn flash_chip_configured_size(&self) -> u32 {
        1024 * 1024
    }

    fn sketch_space(&self) -> Option<SketchSpace> {
        Some(SketchSpace::new(0, MOCK_IMAGE.len() as u32, MOCK_SKETCH_LIMIT))
    }

    fn sketch_checksum(&self) -> Option<u32> {
        Some(image_checksum(MOCK_IMAGE))
    }

    fn memory(&self) -> Option<MemoryStats> {
        Some(MemoryStats::new(40_000, 30_000))
    }

    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn restart(&mut self) -> ! {
        panic!("mock restart")
    }

    fn deep_sleep(&mut self, micros: u64) -> ! {
        panic!("mock deep sleep for {} us", micros)
    }
}

/// Network stack without IPv6
#[derive(Default)]
pub struct MockNetwork {
    hostname: Hostname,
}

impl Network for MockNetwork {
    fn hostname(&self) -> &str {
        self.hostname.as_str()
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        self.hostname.set(hostname)
    }
}

/// Mock target
pub struct MockPlatform<'a>(PhantomData<&'a ()>);

/// Storage size of the mock target
pub const MOCK_NVRAM_SIZE: usize = 512;

impl<'a> Platform for MockPlatform<'a> {
    type Gpio = MockGpio<'a>;
    type Spi = MockSpi<'a>;
    type Storage = MockNvBackend<MOCK_NVRAM_SIZE>;
    type System = MockSystem;
    type Network = MockNetwork;
}

/// Fresh mock components sharing `log`
pub fn parts(log: &RefCell<EventLog>) -> Parts<MockPlatform<'_>> {
    Parts {
        gpio: MockGpio::new(log),
        spi: MockSpi::new(log),
        storage: MockNvBackend::new(),
        system: MockSystem::new(),
        network: MockNetwork::default(),
    }
}
