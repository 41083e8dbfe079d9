//! RP2040 backend for the nRF905 board HAL
//!
//! Implements the `nrf905api-hal` traits on embassy-rp:
//!
//! - GPIO by number over a pin bank, with polled edge interrupts
//! - SPI0 on fixed pins, chip-select on any GPIO
//! - NVRAM in the last 64KB of flash via sequential-storage
//! - Watchdog-based restart and timed deep sleep

#![no_std]

#[macro_use]
mod fmt;

pub mod gpio;
pub mod network;
pub mod nvram;
pub mod pins;
pub mod spi;
pub mod system;

use embassy_rp::Peripherals;
use nrf905api_hal::{BoardPins, Parts, Platform};

pub use gpio::Rp2040Gpio;
pub use network::Rp2040Network;
pub use nvram::Rp2040NvStorage;
pub use spi::Rp2040Spi;
pub use system::Rp2040System;

/// NVRAM working copy size
pub const NVRAM_SIZE: usize = 4096;

/// Raspberry Pi Pico wired to an nRF905 module on SPI0
pub const DEFAULT_PINS: BoardPins = BoardPins {
    led: 25,
    address_match: 20,
    carrier_detect: 21,
    chip_enable: 22,
    data_ready: 26,
    power: 27,
    tx_enable: 28,
    mosi: pins::SPI0_MOSI,
    miso: pins::SPI0_MISO,
    sck: pins::SPI0_SCK,
    cs: 17,
    led_active_low: false,
    carrier_detect_routed: true,
};

/// RP2040 target
pub struct Rp2040Platform;

impl Platform for Rp2040Platform {
    type Gpio = Rp2040Gpio;
    type Spi = Rp2040Spi;
    type Storage = Rp2040NvStorage;
    type System = Rp2040System;
    type Network = Rp2040Network;
}

/// Bring up every backend component from the chip peripherals
pub fn init(p: Peripherals) -> Parts<Rp2040Platform> {
    let (mut bank, rest) = pins::split(p);

    let mut storage = Rp2040NvStorage::new(rest.flash, rest.flash_dma);
    let identity = storage.identify();

    Parts {
        gpio: Rp2040Gpio::new(&mut bank),
        spi: Rp2040Spi::new(rest.spi, rest.spi_sck, rest.spi_mosi, rest.spi_miso),
        storage,
        system: Rp2040System::new(rest.watchdog, identity),
        network: Rp2040Network::new(identity.unique_id),
    }
}
