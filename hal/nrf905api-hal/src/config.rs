//! Board pin map
//!
//! Pin numbers are target-local GPIO numbers as understood by the backend's
//! [`GpioPort`](crate::gpio::GpioPort).

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::spi::SpiPins;

/// Wiring between the MCU and the nRF905 module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardPins {
    /// On-board indicator LED
    pub led: u8,
    /// nRF905 AM (address match)
    pub address_match: u8,
    /// nRF905 CD (carrier detect)
    pub carrier_detect: u8,
    /// nRF905 CE (chip enable)
    pub chip_enable: u8,
    /// nRF905 DR (data ready)
    pub data_ready: u8,
    /// nRF905 PWR_UP
    pub power: u8,
    /// nRF905 TX_EN
    pub tx_enable: u8,
    pub mosi: u8,
    pub miso: u8,
    pub sck: u8,
    /// nRF905 CSN
    pub cs: u8,
    /// LED lights when its pin is driven low
    pub led_active_low: bool,
    /// CD is electrically connected. When false, reading it returns low.
    pub carrier_detect_routed: bool,
}

/// Wiring mistake found by [`BoardPins::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinConflict {
    /// Two lines share one pin
    Shared {
        pin: u8,
        first: &'static str,
        second: &'static str,
    },
    /// A line sits on a pin the target keeps for itself
    Reserved { pin: u8, name: &'static str },
}

impl fmt::Display for PinConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinConflict::Shared { pin, first, second } => {
                write!(f, "{second}: pin {pin} already used by {first}")
            }
            PinConflict::Reserved { pin, name } => {
                write!(f, "{name}: pin {pin} is not available on this target")
            }
        }
    }
}

impl BoardPins {
    /// Every line with its field name, SPI data lines first
    pub fn lines(&self) -> [(&'static str, u8); 11] {
        [
            ("mosi", self.mosi),
            ("miso", self.miso),
            ("sck", self.sck),
            ("led", self.led),
            ("address_match", self.address_match),
            ("carrier_detect", self.carrier_detect),
            ("chip_enable", self.chip_enable),
            ("data_ready", self.data_ready),
            ("power", self.power),
            ("tx_enable", self.tx_enable),
            ("cs", self.cs),
        ]
    }

    /// Find the first pin shared by two lines, or a line outside `usable`
    ///
    /// `usable(pin)` tells whether the target can hand out `pin` as a
    /// plain GPIO. The SPI data lines are exempt from it.
    pub fn check(&self, usable: impl Fn(u8) -> bool) -> Result<(), PinConflict> {
        let lines = self.lines();
        for (i, &(name, pin)) in lines.iter().enumerate() {
            if let Some(&(first, _)) = lines[..i].iter().find(|(_, p)| *p == pin) {
                return Err(PinConflict::Shared {
                    pin,
                    first,
                    second: name,
                });
            }
            if i >= 3 && !usable(pin) {
                return Err(PinConflict::Reserved { pin, name });
            }
        }
        Ok(())
    }

    /// Pins handed to [`SpiEngine::begin`](crate::spi::SpiEngine::begin)
    pub fn spi_pins(&self) -> SpiPins {
        SpiPins {
            mosi: self.mosi,
            miso: self.miso,
            clk: self.sck,
            cs: self.cs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_spi_pins() {
        let spi = PINS.spi_pins();
        assert_eq!(
            spi,
            SpiPins {
                mosi: 13,
                miso: 12,
                clk: 14,
                cs: 15
            }
        );
    }

    #[test]
    fn test_check_accepts_distinct_pins() {
        assert_eq!(PINS.check(|_| true), Ok(()));
    }

    #[test]
    fn test_check_rejects_shared_signal_pin() {
        let pins = BoardPins {
            cs: PINS.data_ready,
            ..PINS
        };
        assert_eq!(
            pins.check(|_| true),
            Err(PinConflict::Shared {
                pin: 35,
                first: "data_ready",
                second: "cs",
            })
        );
    }

    #[test]
    fn test_check_rejects_spi_data_pin() {
        let pins = BoardPins {
            cs: PINS.sck,
            ..PINS
        };
        assert_eq!(
            pins.check(|_| true),
            Err(PinConflict::Shared {
                pin: 14,
                first: "sck",
                second: "cs",
            })
        );
    }

    #[test]
    fn test_check_rejects_unusable_pin() {
        // Only the SPI data lines may sit on pins the GPIO bank lacks
        let usable = |pin: u8| !matches!(pin, 12..=14 | 2);
        assert_eq!(
            PINS.check(usable),
            Err(PinConflict::Reserved { pin: 2, name: "led" })
        );
        let pins = BoardPins { led: 4, ..PINS };
        assert_eq!(pins.check(usable), Ok(()));
    }

    #[test]
    fn test_postcard_round_trip() {
        let mut buf = [0u8; 32];
        let bytes = postcard::to_slice(&PINS, &mut buf).unwrap();
        let decoded: BoardPins = postcard::from_bytes(bytes).unwrap();
        assert_eq!(decoded, PINS);
    }
}
