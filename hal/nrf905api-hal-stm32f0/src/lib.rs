//! STM32F0 backend for the nRF905 board HAL
//!
//! Supports STM32F042 parts (F6 and K6 packages). The radio sits on SPI1;
//! the other lines are plain GPIO from ports A and B.
//!
//! # Features
//!
//! - `stm32f042f6` / `stm32f042k6` - Chip variant, select one
//! - `defmt` - Enable debug formatting support
//!
//! # Limitations
//!
//! Carrier-detect has no usable pin on the reference wiring and reads low.
//! IPv6 is not available.

#![no_std]

#[macro_use]
mod fmt;

pub mod gpio;
pub mod network;
pub mod nvram;
pub mod spi;
pub mod system;

use embassy_stm32::Peripherals;
use nrf905api_hal::{BoardPins, Parts, Platform};

pub use gpio::{pin_number, Stm32Gpio};
pub use network::Stm32Network;
pub use nvram::Stm32NvStorage;
pub use spi::Stm32Spi;
pub use system::Stm32System;

/// NVRAM working copy size
pub const NVRAM_SIZE: usize = 512;

/// SYSCLK with the default clock tree (HSI)
pub const DEFAULT_CPU_MHZ: u32 = 8;

/// STM32F042 wired to an nRF905 module on SPI1
pub const DEFAULT_PINS: BoardPins = BoardPins {
    led: pin_number('B', 1),
    address_match: pin_number('A', 0),
    carrier_detect: pin_number('A', 1),
    chip_enable: pin_number('A', 2),
    data_ready: pin_number('A', 3),
    power: pin_number('A', 9),
    tx_enable: pin_number('A', 10),
    mosi: spi::SPI1_MOSI,
    miso: spi::SPI1_MISO,
    sck: spi::SPI1_SCK,
    cs: pin_number('A', 4),
    led_active_low: true,
    carrier_detect_routed: false,
};

/// STM32F0 target
pub struct Stm32Platform;

impl Platform for Stm32Platform {
    type Gpio = Stm32Gpio;
    type Spi = Stm32Spi;
    type Storage = Stm32NvStorage;
    type System = Stm32System;
    type Network = Stm32Network;
}

/// Bring up every backend component from the chip peripherals
pub fn init(p: Peripherals, cpu_mhz: u32) -> Parts<Stm32Platform> {
    let mut gpio = Stm32Gpio::new();
    gpio.add(pin_number('A', 0), p.PA0);
    gpio.add(pin_number('A', 1), p.PA1);
    gpio.add(pin_number('A', 2), p.PA2);
    gpio.add(pin_number('A', 3), p.PA3);
    gpio.add(pin_number('A', 4), p.PA4);
    gpio.add(pin_number('A', 9), p.PA9);
    gpio.add(pin_number('A', 10), p.PA10);
    gpio.add(pin_number('B', 1), p.PB1);

    Parts {
        gpio,
        spi: Stm32Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6),
        storage: Stm32NvStorage::new(p.FLASH),
        system: Stm32System::new(p.IWDG, cpu_mhz),
        network: Stm32Network::new(),
    }
}
