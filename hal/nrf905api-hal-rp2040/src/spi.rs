//! SPI0 host
//!
//! SPI0 is routed to fixed pins (MISO 16, SCK 18, MOSI 19). Chip-select is
//! any bank GPIO and is driven by the engine, not here.
//!
//! The PL022 only shifts MSB first, so LSB-first transfers are bit-reversed
//! in software on the way in and out.

use embassy_rp::peripherals::{PIN_16, PIN_18, PIN_19, SPI0};
use embassy_rp::spi::{self, Blocking, Spi};
use embassy_rp::Peri;
use nrf905api_hal::spi::{Phase, Polarity};
use nrf905api_hal::{BitOrder, HalError, Result, SpiHost, SpiPins, SpiSettings};

use crate::pins::{SPI0_MISO, SPI0_MOSI, SPI0_SCK};

struct Spi0Peripherals {
    spi: Peri<'static, SPI0>,
    sck: Peri<'static, PIN_18>,
    mosi: Peri<'static, PIN_19>,
    miso: Peri<'static, PIN_16>,
}

/// SPI0 host
///
/// The driver exists only while the bus is claimed. Dropping it on
/// release shuts SPI0 down and hands the pins back.
pub struct Rp2040Spi {
    peripherals: Spi0Peripherals,
    driver: Option<Spi<'static, SPI0, Blocking>>,
    lsb_first: bool,
}

impl Rp2040Spi {
    pub fn new(
        spi: Peri<'static, SPI0>,
        sck: Peri<'static, PIN_18>,
        mosi: Peri<'static, PIN_19>,
        miso: Peri<'static, PIN_16>,
    ) -> Self {
        Self {
            peripherals: Spi0Peripherals {
                spi,
                sck,
                mosi,
                miso,
            },
            driver: None,
            lsb_first: false,
        }
    }

    fn driver(&mut self) -> Result<&mut Spi<'static, SPI0, Blocking>> {
        self.driver.as_mut().ok_or(HalError::BusNotClaimed)
    }
}

fn config_for(settings: &SpiSettings) -> spi::Config {
    let (polarity, phase): (Polarity, Phase) = settings.mode.into();
    let mut config = spi::Config::default();
    config.frequency = settings.frequency;
    config.polarity = match polarity {
        Polarity::IdleLow => spi::Polarity::IdleLow,
        Polarity::IdleHigh => spi::Polarity::IdleHigh,
    };
    config.phase = match phase {
        Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
        Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
    };
    config
}

impl SpiHost for Rp2040Spi {
    fn claim(&mut self, pins: SpiPins) -> Result<()> {
        if self.driver.is_some() {
            return Err(HalError::BusInUse);
        }
        if (pins.miso, pins.clk, pins.mosi) != (SPI0_MISO, SPI0_SCK, SPI0_MOSI) {
            warn!(
                "SPI0 is wired to miso={} sck={} mosi={}",
                SPI0_MISO, SPI0_SCK, SPI0_MOSI
            );
            return Err(HalError::InvalidPin);
        }
        let p = &self.peripherals;
        // SAFETY: the driver built from these handles on the previous claim
        // was dropped in `release`, so only one driver ever owns them.
        let driver = unsafe {
            Spi::new_blocking(
                p.spi.clone_unchecked(),
                p.sck.clone_unchecked(),
                p.mosi.clone_unchecked(),
                p.miso.clone_unchecked(),
                spi::Config::default(),
            )
        };
        self.driver = Some(driver);
        debug!("SPI0 up");
        Ok(())
    }

    fn release(&mut self) {
        if self.driver.take().is_some() {
            debug!("SPI0 down");
        }
    }

    fn begin_transaction(&mut self, settings: &SpiSettings) -> Result<()> {
        self.driver()?.set_config(&config_for(settings));
        self.lsb_first = settings.bit_order == BitOrder::LsbFirst;
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        let lsb_first = self.lsb_first;
        let driver = self.driver()?;
        if lsb_first {
            words.iter_mut().for_each(|w| *w = w.reverse_bits());
        }
        let result = driver.blocking_transfer_in_place(words);
        if lsb_first {
            words.iter_mut().for_each(|w| *w = w.reverse_bits());
        }
        result.map_err(|_| {
            debug!("SPI0 transfer of {} bytes failed", words.len());
            HalError::Bus
        })
    }

    fn end_transaction(&mut self) {}
}
