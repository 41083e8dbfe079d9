//! SPI1 host on PA5 (SCK), PA6 (MISO), PA7 (MOSI)

use embassy_stm32::mode::Blocking;
use embassy_stm32::peripherals::{PA5, PA6, PA7, SPI1};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::Peri;
use nrf905api_hal::spi::{Phase, Polarity};
use nrf905api_hal::{BitOrder, HalError, Result, SpiHost, SpiPins, SpiSettings};

use crate::gpio::pin_number;

pub const SPI1_SCK: u8 = pin_number('A', 5);
pub const SPI1_MISO: u8 = pin_number('A', 6);
pub const SPI1_MOSI: u8 = pin_number('A', 7);

struct Spi1Peripherals {
    spi: Peri<'static, SPI1>,
    sck: Peri<'static, PA5>,
    mosi: Peri<'static, PA7>,
    miso: Peri<'static, PA6>,
}

/// SPI1 host
///
/// The driver exists only while the bus is claimed. Dropping it on
/// release disables SPI1 and disconnects its pins.
pub struct Stm32Spi {
    peripherals: Spi1Peripherals,
    driver: Option<Spi<'static, Blocking>>,
}

impl Stm32Spi {
    pub fn new(
        spi: Peri<'static, SPI1>,
        sck: Peri<'static, PA5>,
        mosi: Peri<'static, PA7>,
        miso: Peri<'static, PA6>,
    ) -> Self {
        Self {
            peripherals: Spi1Peripherals {
                spi,
                sck,
                mosi,
                miso,
            },
            driver: None,
        }
    }

    fn driver(&mut self) -> Result<&mut Spi<'static, Blocking>> {
        self.driver.as_mut().ok_or(HalError::BusNotClaimed)
    }
}

fn config_for(settings: &SpiSettings) -> spi::Config {
    let (polarity, phase): (Polarity, Phase) = settings.mode.into();
    let mut config = spi::Config::default();
    config.frequency = Hertz(settings.frequency);
    config.mode = spi::Mode {
        polarity: match polarity {
            Polarity::IdleLow => spi::Polarity::IdleLow,
            Polarity::IdleHigh => spi::Polarity::IdleHigh,
        },
        phase: match phase {
            Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
            Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
        },
    };
    config.bit_order = match settings.bit_order {
        BitOrder::MsbFirst => spi::BitOrder::MsbFirst,
        BitOrder::LsbFirst => spi::BitOrder::LsbFirst,
    };
    config
}

impl SpiHost for Stm32Spi {
    fn claim(&mut self, pins: SpiPins) -> Result<()> {
        if self.driver.is_some() {
            return Err(HalError::BusInUse);
        }
        if (pins.clk, pins.miso, pins.mosi) != (SPI1_SCK, SPI1_MISO, SPI1_MOSI) {
            warn!("SPI1 is wired to PA5/PA6/PA7");
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
        Ok(())
    }

    fn release(&mut self) {
        self.driver = None;
    }

    fn begin_transaction(&mut self, settings: &SpiSettings) -> Result<()> {
        self.driver()?
            .set_config(&config_for(settings))
            .map_err(|_| HalError::Bus)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        self.driver()?
            .blocking_transfer_in_place(words)
            .map_err(|_| HalError::Bus)
    }

    fn end_transaction(&mut self) {}
}
