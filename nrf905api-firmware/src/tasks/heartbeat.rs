//! LED heartbeat
//!
//! Slow blink while idle, fast while the carrier is busy.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};

use crate::channels::{SharedBoard, CARRIER_DETECT};

const IDLE_PERIOD_MS: u64 = 1000;
const BUSY_PERIOD_MS: u64 = 100;
const BUSY_BLINKS: u8 = 10;

#[embassy_executor::task]
pub async fn heartbeat_task(board: &'static SharedBoard) {
    defmt::info!("Heartbeat task started");

    let mut busy_blinks = 0u8;
    loop {
        let period = if busy_blinks > 0 {
            busy_blinks -= 1;
            BUSY_PERIOD_MS
        } else {
            IDLE_PERIOD_MS
        };

        match select(Timer::after(Duration::from_millis(period / 2)), CARRIER_DETECT.wait()).await {
            Either::First(()) => {
                let mut board = board.lock().await;
                let on = !board.led();
                board.set_led(on);
            }
            Either::Second(()) => busy_blinks = BUSY_BLINKS,
        }
    }
}
