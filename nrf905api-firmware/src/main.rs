//! nRF905API - nRF905 radio gateway firmware
//!
//! Brings up the board HAL on the selected target, records the boot in
//! NVRAM, checks that the nRF905 answers on SPI and then listens.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex;
use nrf905api_hal::{Board, Edge};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

mod boot;
mod channels;
mod config;
mod radio;
mod target;
mod tasks;

use crate::channels::SharedBoard;
use crate::target::TargetBoard;

/// Payload width when the config register cannot be read
const DEFAULT_PAYLOAD_WIDTH: u8 = radio::MAX_PAYLOAD as u8;

static BOARD: StaticCell<SharedBoard> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("nRF905API firmware starting...");

    let parts = target::init();
    let mut board: TargetBoard = Board::new(parts, config::BOARD_PINS);
    info!("Pins: {}", board.pins());

    if let Some(name) = config::HOSTNAME {
        if let Err(e) = board.set_hostname(name) {
            warn!("Hostname '{}' rejected: {}", name, e);
        }
    }
    log_system(&mut board);

    let boot = boot::record_boot(&mut board);
    info!("Boot #{} ({} watchdog resets)", boot.boots, boot.watchdog_resets);

    let mut payload_width = DEFAULT_PAYLOAD_WIDTH;
    match radio::bring_up(&mut board).and_then(|()| radio::read_config(&mut board)) {
        Ok(Some(config)) => {
            info!("nRF905 config: {}", config);
            if config.rx_payload_width > 0 {
                payload_width = config.rx_payload_width;
            }
        }
        Ok(None) => warn!("Continuing without a verified radio"),
        Err(e) => error!("nRF905 bring-up failed: {}", e),
    }

    let pins = *board.pins();
    board.attach_interrupt(pins.data_ready, channels::on_data_ready, Edge::Rising);
    board.attach_interrupt(pins.carrier_detect, channels::on_carrier_detect, Edge::Rising);
    radio::listen(&mut board);

    let board: &'static SharedBoard = BOARD.init(Mutex::new(board));

    unwrap!(spawner.spawn(tasks::irq_task(board)));
    unwrap!(spawner.spawn(tasks::heartbeat_task(board)));
    unwrap!(spawner.spawn(tasks::receive_task(board, payload_width)));

    info!("Listening");
}

fn log_system(board: &mut TargetBoard) {
    info!(
        "{} @ {} MHz, core {} on {}",
        board.arch(),
        board.cpu_freq_hz() / 1_000_000,
        board.core_version(),
        board.sdk_version()
    );
    info!("Reset reason: {}", board.restart_reason().cpu0);
    info!("CPU id: {=u64:016x}", board.cpu_id());
    let (size, mode) = (board.flash_chip_size(), board.flash_mode().as_str());
    match board.flash_chip_id() {
        Some(id) => info!("Flash: {=u32:06x}, {} bytes, {}", id, size, mode),
        None => info!("Flash: {} bytes, {}", size, mode),
    }
    let configured = board.flash_chip_configured_size();
    if configured != size {
        warn!("Flash: firmware built for {} bytes", configured);
    }
    if let (Some(used), Some(free)) = (board.sketch_size(), board.free_sketch_space()) {
        info!("Firmware: {} bytes, {} free", used, free);
    }
    if let Some(crc) = board.sketch_checksum() {
        info!("Firmware CRC-32: {=u32:08x}", crc);
    }
    if let Some(secs) = board.build_timestamp() {
        info!("Built at {} (Unix time)", secs);
    }
    info!("Flash check: {}", board.check_flash());
    if let Some(memory) = board.memory() {
        info!(
            "Heap: {} free, {} max block, {}% fragmented",
            memory.free, memory.largest_free_block, memory.fragmentation
        );
    }
    info!("Hostname: {}", board.hostname());
    if board.enable_ipv6() {
        match board.local_ipv6() {
            Ok(addr) => info!("IPv6: {}", defmt::Display2Format(&addr)),
            Err(e) => warn!("IPv6 unavailable: {}", e),
        }
    }
}
