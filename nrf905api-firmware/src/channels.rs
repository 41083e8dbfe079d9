//! Signals between interrupt handlers and tasks

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::target::TargetBoard;

/// The board, shared between tasks
pub type SharedBoard = Mutex<CriticalSectionRawMutex, TargetBoard>;

/// nRF905 DR went high: a payload is waiting
pub static DATA_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// nRF905 CD went high: the channel is busy
pub static CARRIER_DETECT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

pub fn on_data_ready() {
    DATA_READY.signal(());
}

pub fn on_carrier_detect() {
    CARRIER_DETECT.signal(());
}
