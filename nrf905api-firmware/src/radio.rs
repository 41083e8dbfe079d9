//! nRF905 bring-up over the board SPI bus
//!
//! Only what the gateway needs at boot: power and mode lines, a config
//! register readback to prove the module answers, and payload reads.

use defmt::*;
use heapless::Vec;
use nrf905api_hal::{BitOrder, ChipSelectLevel, HalError, Level, Mode, PinMode, Result};

use crate::target::TargetBoard;

/// Maximum SCK the nRF905 accepts
pub const SPI_FREQUENCY: u32 = 10_000_000;

/// Configuration register length
pub const CONFIG_LEN: usize = 10;

/// Largest RX payload width
pub const MAX_PAYLOAD: usize = 32;

/// Instruction set
mod cmd {
    pub const R_CONFIG: u8 = 0x10;
    pub const R_RX_PAYLOAD: u8 = 0x24;
}

/// Decoded fields of the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct RadioConfig {
    pub channel: u16,
    pub hfreq_pll: bool,
    pub rx_address_width: u8,
    pub tx_address_width: u8,
    pub rx_payload_width: u8,
    pub tx_payload_width: u8,
}

impl RadioConfig {
    pub fn from_register(reg: &[u8; CONFIG_LEN]) -> Self {
        Self {
            channel: u16::from(reg[0]) | (u16::from(reg[1] & 0x01) << 8),
            hfreq_pll: reg[1] & 0x02 != 0,
            rx_address_width: reg[2] & 0x07,
            tx_address_width: (reg[2] >> 4) & 0x07,
            rx_payload_width: reg[3] & 0x3F,
            tx_payload_width: reg[4] & 0x3F,
        }
    }

    /// All-zero or all-one readback means nothing is driving MISO
    fn looks_floating(reg: &[u8; CONFIG_LEN]) -> bool {
        reg.iter().all(|&b| b == 0x00) || reg.iter().all(|&b| b == 0xFF)
    }
}

/// Configure the radio lines and the SPI bus, then leave the chip in
/// standby receive mode
pub fn bring_up(board: &mut TargetBoard) -> Result<()> {
    let pins = *board.pins();

    for pin in [pins.power, pins.chip_enable, pins.tx_enable] {
        board.set_pin_mode(pin, PinMode::Output);
        board.write_pin(pin, Level::Low);
    }
    for pin in [pins.address_match, pins.data_ready, pins.carrier_detect] {
        board.set_pin_mode(pin, PinMode::Input);
    }

    board.spi_begin(pins.spi_pins())?;
    board.spi_set_chip_select_polarity(pins.cs, ChipSelectLevel::ActiveLow);
    board.spi_set_data_mode(Mode::Mode0);
    board.spi_set_bit_order(BitOrder::MsbFirst);
    board.spi_set_frequency(SPI_FREQUENCY);

    board.write_pin(pins.power, Level::High);
    info!("nRF905 powered up");
    Ok(())
}

/// Read and decode the configuration register
pub fn read_config(board: &mut TargetBoard) -> Result<Option<RadioConfig>> {
    let mut frame = [0u8; CONFIG_LEN + 1];
    frame[0] = cmd::R_CONFIG;
    board.spi_transfer_buffer(&mut frame)?;

    let mut reg = [0u8; CONFIG_LEN];
    reg.copy_from_slice(&frame[1..]);
    if RadioConfig::looks_floating(&reg) {
        warn!("nRF905 config readback {=[u8]:02x}, module not answering", reg);
        return Ok(None);
    }
    Ok(Some(RadioConfig::from_register(&reg)))
}

/// Enter receive mode
pub fn listen(board: &mut TargetBoard) {
    let pins = *board.pins();
    board.write_pin(pins.tx_enable, Level::Low);
    board.write_pin(pins.chip_enable, Level::High);
}

/// Read a received payload of `width` bytes
pub fn read_payload(board: &mut TargetBoard, width: u8) -> Result<Vec<u8, MAX_PAYLOAD>> {
    let width = usize::from(width).min(MAX_PAYLOAD);
    let mut frame = [0u8; MAX_PAYLOAD + 1];
    frame[0] = cmd::R_RX_PAYLOAD;
    board.spi_transfer_buffer(&mut frame[..=width])?;

    Vec::from_slice(&frame[1..=width]).map_err(|()| HalError::OutOfRange)
}
