//! Pin allocation by number
//!
//! The board pin map comes from configuration, so pins are handed out by
//! GPIO number at runtime. The SPI0 data and clock pins are split off with
//! their concrete types because the SPI driver needs them typed.

use embassy_rp::gpio::AnyPin;
use embassy_rp::peripherals::{
    DMA_CH0, FLASH, PIN_16, PIN_18, PIN_19, SPI0, WATCHDOG,
};
use embassy_rp::{Peri, Peripherals};

/// Number of user GPIOs on the RP2040
pub const GPIO_COUNT: usize = 30;

/// GPIO numbers split off for SPI0, absent from the bank
pub const SPI0_MISO: u8 = 16;
pub const SPI0_SCK: u8 = 18;
pub const SPI0_MOSI: u8 = 19;

/// Untyped GPIO pins, taken by number
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
}

impl PinBank {
    /// Drain every pin still in the bank, with its number
    pub fn drain(&mut self) -> impl Iterator<Item = (u8, Peri<'static, AnyPin>)> + '_ {
        self.pins
            .iter_mut()
            .enumerate()
            .filter_map(|(n, slot)| slot.take().map(|pin| (n as u8, pin)))
    }
}

/// Peripherals the backend needs besides plain GPIO
pub struct BoardPeripherals {
    pub flash: Peri<'static, FLASH>,
    pub flash_dma: Peri<'static, DMA_CH0>,
    pub watchdog: Peri<'static, WATCHDOG>,
    pub spi: Peri<'static, SPI0>,
    pub spi_miso: Peri<'static, PIN_16>,
    pub spi_sck: Peri<'static, PIN_18>,
    pub spi_mosi: Peri<'static, PIN_19>,
}

/// Split the chip peripherals into the numbered pin bank and the rest
pub fn split(p: Peripherals) -> (PinBank, BoardPeripherals) {
    let bank = PinBank {
        pins: [
            Some(p.PIN_0.into()),
            Some(p.PIN_1.into()),
            Some(p.PIN_2.into()),
            Some(p.PIN_3.into()),
            Some(p.PIN_4.into()),
            Some(p.PIN_5.into()),
            Some(p.PIN_6.into()),
            Some(p.PIN_7.into()),
            Some(p.PIN_8.into()),
            Some(p.PIN_9.into()),
            Some(p.PIN_10.into()),
            Some(p.PIN_11.into()),
            Some(p.PIN_12.into()),
            Some(p.PIN_13.into()),
            Some(p.PIN_14.into()),
            Some(p.PIN_15.into()),
            None,
            Some(p.PIN_17.into()),
            None,
            None,
            Some(p.PIN_20.into()),
            Some(p.PIN_21.into()),
            Some(p.PIN_22.into()),
            Some(p.PIN_23.into()),
            Some(p.PIN_24.into()),
            Some(p.PIN_25.into()),
            Some(p.PIN_26.into()),
            Some(p.PIN_27.into()),
            Some(p.PIN_28.into()),
            Some(p.PIN_29.into()),
        ],
    };
    let rest = BoardPeripherals {
        flash: p.FLASH,
        flash_dma: p.DMA_CH0,
        watchdog: p.WATCHDOG,
        spi: p.SPI0,
        spi_miso: p.PIN_16,
        spi_sck: p.PIN_18,
        spi_mosi: p.PIN_19,
    };
    (bank, rest)
}
