//! Boot bookkeeping kept in NVRAM

use defmt::*;
use nrf905api_hal::{HalError, ResetReason};
use serde::{Deserialize, Serialize};

use crate::target::TargetBoard;

/// NVRAM offset of the boot record
pub const BOOT_RECORD_OFFSET: usize = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Format)]
pub struct BootRecord {
    pub boots: u32,
    pub watchdog_resets: u32,
    pub last_reset: Option<ResetReason>,
}

impl BootRecord {
    fn record(&mut self, reason: ResetReason) {
        self.boots = self.boots.wrapping_add(1);
        if reason == ResetReason::Watchdog {
            self.watchdog_resets = self.watchdog_resets.wrapping_add(1);
        }
        self.last_reset = Some(reason);
    }
}

/// Count this boot and commit the record
pub fn record_boot(board: &mut TargetBoard) -> BootRecord {
    let reason = board.restart_reason().cpu0;

    let mut record = match board.nvram().load_record::<BootRecord>(BOOT_RECORD_OFFSET) {
        Ok(record) => record,
        Err(HalError::NotFound) => {
            info!("No boot record, starting fresh");
            BootRecord::default()
        }
        Err(e) => {
            warn!("Boot record unreadable: {}", e);
            BootRecord::default()
        }
    };
    record.record(reason);

    if let Err(e) = board
        .nvram_mut()
        .store_record(BOOT_RECORD_OFFSET, &record)
        .and_then(|_| board.commit_nvram())
    {
        warn!("Boot record not saved: {}", e);
    }
    record
}
