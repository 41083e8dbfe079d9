//! Interrupt servicing task
//!
//! Edge interrupts are polled: every tick samples the attached lines and
//! runs the handlers of lines that changed.

use embassy_time::{Duration, Ticker};

use crate::channels::SharedBoard;
use crate::target;

/// Poll interval in microseconds
pub const POLL_INTERVAL_US: u64 = 500;

#[embassy_executor::task]
pub async fn irq_task(board: &'static SharedBoard) {
    defmt::info!("IRQ task started");

    let mut ticker = Ticker::every(Duration::from_micros(POLL_INTERVAL_US));
    loop {
        ticker.next().await;
        let mut board = board.lock().await;
        target::service_interrupts(board.gpio_mut());
    }
}
