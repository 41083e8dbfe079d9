//! Payload receive task

use defmt::*;

use crate::channels::{SharedBoard, DATA_READY};
use crate::radio;

#[embassy_executor::task]
pub async fn receive_task(board: &'static SharedBoard, payload_width: u8) {
    info!("Receive task started, {} byte payloads", payload_width);

    let mut received = 0u32;
    loop {
        DATA_READY.wait().await;
        let mut board = board.lock().await;
        match radio::read_payload(&mut board, payload_width) {
            Ok(payload) => {
                received = received.wrapping_add(1);
                info!("RX #{}: {=[u8]:02x}", received, payload.as_slice());
            }
            Err(e) => warn!("Payload read failed: {}", e),
        }
    }
}
