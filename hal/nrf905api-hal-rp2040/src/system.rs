//! RP2040 runtime queries and power control
//!
//! The RP2040 has no true deep sleep that survives into a reset, so deep
//! sleep is a watchdog-timed reset. A magic value in watchdog scratch
//! register 0 marks the reset as a sleep wake.
//!
//! The firmware image is measured from the cortex-m-rt section symbols: it
//! ends where the `.data` load image ends.

use cortex_m::asm;
use embassy_rp::peripherals::WATCHDOG;
use embassy_rp::watchdog::{ResetReason as RpResetReason, Watchdog};
use embassy_rp::Peri;
use embassy_time::Duration;
use embedded_alloc::LlffHeap;
use nrf905api_hal::system::{flash_size_from_jedec, image_checksum};
use nrf905api_hal::{FlashMode, MemoryStats, ResetReason, SketchSpace, SystemInfo};

use crate::nvram::{FlashIdentity, CONFIG_PARTITION_START, FLASH_SIZE};

/// Scratch register holding the deep sleep marker
const SLEEP_SCRATCH: usize = 0;
const SLEEP_MAGIC: u32 = 0x6e52_4635;

/// Longest watchdog period, rounded down
pub const MAX_SLEEP_MICROS: u64 = 8_300_000;

/// XIP address of flash offset 0, where boot2 sits
const FLASH_ORIGIN: u32 = 0x1000_0000;

extern "C" {
    static __sidata: u8;
    static __sdata: u8;
    static __edata: u8;
}

/// First flash address past the firmware image
fn image_end() -> u32 {
    // SAFETY: linker symbols; only their addresses are used
    unsafe {
        let load = core::ptr::addr_of!(__sidata) as u32;
        let start = core::ptr::addr_of!(__sdata) as u32;
        let end = core::ptr::addr_of!(__edata) as u32;
        load + (end - start)
    }
}

pub struct Rp2040System {
    watchdog: Watchdog,
    reset_reason: ResetReason,
    flash: FlashIdentity,
    heap: Option<&'static LlffHeap>,
    build_timestamp: Option<u64>,
}

impl Rp2040System {
    /// Capture the reset reason and clear the sleep marker
    pub fn new(watchdog: Peri<'static, WATCHDOG>, flash: FlashIdentity) -> Self {
        let mut watchdog = Watchdog::new(watchdog);
        let slept = watchdog.get_scratch(SLEEP_SCRATCH) == SLEEP_MAGIC;
        watchdog.set_scratch(SLEEP_SCRATCH, 0);

        let reset_reason = match (watchdog.reset_reason(), slept) {
            (Some(_), true) => ResetReason::DeepSleepWake,
            (Some(RpResetReason::Forced), false) => ResetReason::Software,
            (Some(RpResetReason::TimedOut), false) => ResetReason::Watchdog,
            (None, _) => ResetReason::PowerOn,
        };
        info!("Reset reason: {}", reset_reason);

        Self {
            watchdog,
            reset_reason,
            flash,
            heap: None,
            build_timestamp: None,
        }
    }

    /// Report statistics for `heap`
    pub fn with_heap(mut self, heap: &'static LlffHeap) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Report `secs` (Unix time) as the build time
    pub fn with_build_timestamp(mut self, secs: u64) -> Self {
        self.build_timestamp = Some(secs);
        self
    }
}

impl SystemInfo for Rp2040System {
    fn arch(&self) -> &'static str {
        "rp2040"
    }

    fn cpu_freq_hz(&self) -> u32 {
        embassy_rp::clocks::clk_sys_freq()
    }

    fn sdk_version(&self) -> &'static str {
        "embassy-rp 0.9"
    }

    fn core_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn cpu_id(&self) -> u64 {
        self.flash.unique_id
    }

    fn flash_chip_id(&self) -> Option<u32> {
        self.flash.jedec_id
    }

    /// Size from the JEDEC capacity byte, else the linked size
    fn flash_chip_size(&self) -> u32 {
        self.flash
            .jedec_id
            .and_then(flash_size_from_jedec)
            .unwrap_or(FLASH_SIZE as u32)
    }

    fn flash_chip_configured_size(&self) -> u32 {
        FLASH_SIZE as u32
    }

    fn sketch_space(&self) -> Option<SketchSpace> {
        Some(SketchSpace::new(
            FLASH_ORIGIN,
            image_end(),
            FLASH_ORIGIN + CONFIG_PARTITION_START as u32,
        ))
    }

    fn sketch_checksum(&self) -> Option<u32> {
        let len = image_end().checked_sub(FLASH_ORIGIN)? as usize;
        // SAFETY: the image is mapped read-only through XIP and is never
        // rewritten; NVRAM commits only touch the config partition
        let image = unsafe { core::slice::from_raw_parts(FLASH_ORIGIN as *const u8, len) };
        Some(image_checksum(image))
    }

    fn build_timestamp(&self) -> Option<u64> {
        self.build_timestamp
    }

    fn flash_mode(&self) -> FlashMode {
        // boot2 runs the external flash in quad I/O
        FlashMode::Qio
    }

    /// The allocator only reports a free total, so the largest block is
    /// taken as the whole free space.
    fn memory(&self) -> Option<MemoryStats> {
        self.heap.map(|heap| {
            let free = heap.free() as u32;
            MemoryStats::new(free, free)
        })
    }

    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn restart(&mut self) -> ! {
        self.watchdog.trigger_reset();
        loop {
            asm::nop();
        }
    }

    fn deep_sleep(&mut self, micros: u64) -> ! {
        if micros > MAX_SLEEP_MICROS {
            warn!("Deep sleep clamped to {} us", MAX_SLEEP_MICROS);
        }
        let micros = micros.clamp(1, MAX_SLEEP_MICROS);
        self.watchdog.set_scratch(SLEEP_SCRATCH, SLEEP_MAGIC);
        self.watchdog.start(Duration::from_micros(micros));
        loop {
            asm::wfi();
        }
    }
}
