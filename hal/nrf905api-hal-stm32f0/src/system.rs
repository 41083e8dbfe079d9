//! STM32F0 runtime queries and power control
//!
//! There is no heap and no external flash. Deep sleep is an IWDG-timed
//! reset; the chip keeps no marker across it, so a wake reports as a
//! watchdog reset.
//!
//! The firmware image ends where the cortex-m-rt `.data` load image ends.

use cortex_m::asm;
use cortex_m::peripheral::SCB;
use embassy_stm32::pac::RCC;
use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_stm32::Peri;
use nrf905api_hal::system::image_checksum;
use nrf905api_hal::{FlashMode, MemoryStats, ResetReason, SketchSpace, SystemInfo};

use crate::nvram::{CONFIG_PARTITION_START, FLASH_SIZE};

/// Longest IWDG period (LSI 40kHz, prescaler 256, reload 4095)
pub const MAX_SLEEP_MICROS: u64 = 26_000_000;

/// Main flash as mapped at boot
const FLASH_ORIGIN: u32 = 0x0800_0000;

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

/// Read and clear the RCC reset flags
fn take_reset_reason() -> ResetReason {
    let csr = RCC.csr().read();
    let reason = if csr.lpwrrstf() {
        ResetReason::Unknown
    } else if csr.iwdgrstf() || csr.wwdgrstf() {
        ResetReason::Watchdog
    } else if csr.sftrstf() {
        ResetReason::Software
    } else if csr.porrstf() {
        ResetReason::PowerOn
    } else if csr.pinrstf() {
        ResetReason::External
    } else {
        ResetReason::Unknown
    };
    RCC.csr().modify(|w| w.set_rmvf(true));
    reason
}

pub struct Stm32System {
    iwdg: Option<Peri<'static, IWDG>>,
    reset_reason: ResetReason,
    cpu_mhz: u32,
    uid: u64,
    build_timestamp: Option<u64>,
}

impl Stm32System {
    /// `cpu_mhz` is the SYSCLK the chip was configured for
    pub fn new(iwdg: Peri<'static, IWDG>, cpu_mhz: u32) -> Self {
        let reset_reason = take_reset_reason();
        info!("Reset reason: {}", reset_reason);

        let uid = embassy_stm32::uid::uid();
        let mut lo = [0u8; 8];
        lo.copy_from_slice(&uid[..8]);
        let mut hi = [0u8; 4];
        hi.copy_from_slice(&uid[8..]);

        Self {
            iwdg: Some(iwdg),
            reset_reason,
            cpu_mhz,
            uid: u64::from_le_bytes(lo) ^ (u64::from(u32::from_le_bytes(hi)) << 16),
            build_timestamp: None,
        }
    }

    /// Report `secs` (Unix time) as the build time
    pub fn with_build_timestamp(mut self, secs: u64) -> Self {
        self.build_timestamp = Some(secs);
        self
    }
}

impl SystemInfo for Stm32System {
    fn arch(&self) -> &'static str {
        "stm32f0"
    }

    fn cpu_freq_hz(&self) -> u32 {
        self.cpu_mhz * 1_000_000
    }

    fn sdk_version(&self) -> &'static str {
        "embassy-stm32 0.5"
    }

    fn core_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn cpu_id(&self) -> u64 {
        self.uid
    }

    fn flash_chip_id(&self) -> Option<u32> {
        None
    }

    fn flash_chip_size(&self) -> u32 {
        FLASH_SIZE as u32
    }

    fn flash_mode(&self) -> FlashMode {
        FlashMode::Internal
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
        // SAFETY: main flash is memory mapped; commits only erase the
        // config page above the image
        let image = unsafe { core::slice::from_raw_parts(FLASH_ORIGIN as *const u8, len) };
        Some(image_checksum(image))
    }

    fn build_timestamp(&self) -> Option<u64> {
        self.build_timestamp
    }

    fn memory(&self) -> Option<MemoryStats> {
        None
    }

    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn restart(&mut self) -> ! {
        SCB::sys_reset()
    }

    fn deep_sleep(&mut self, micros: u64) -> ! {
        if micros > MAX_SLEEP_MICROS {
            warn!("Deep sleep clamped to {} us", MAX_SLEEP_MICROS);
        }
        let micros = micros.clamp(1, MAX_SLEEP_MICROS) as u32;
        match self.iwdg.take() {
            Some(iwdg) => {
                let mut wdg = IndependentWatchdog::new(iwdg, micros);
                wdg.unleash();
                loop {
                    asm::wfi();
                }
            }
            None => SCB::sys_reset(),
        }
    }
}
