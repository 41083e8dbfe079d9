//! NVRAM backend in the last flash page
//!
//! STM32F042 has 32KB flash with 1KB pages. The whole image lives raw in
//! the top page: a commit erases the page and programs it back.

use embassy_stm32::flash::{Blocking, Flash};
use embassy_stm32::peripherals::FLASH;
use embassy_stm32::Peri;
use nrf905api_hal::{HalError, NvBackend, Result};

pub const FLASH_SIZE: usize = 32 * 1024;

/// Flash page size for STM32F0 series
pub const FLASH_PAGE_SIZE: usize = 1024;

pub const CONFIG_PARTITION_SIZE: usize = FLASH_PAGE_SIZE;
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Program granularity (half-word)
const WRITE_SIZE: usize = 2;

pub struct Stm32NvStorage {
    flash: Flash<'static, Blocking>,
}

impl Stm32NvStorage {
    pub fn new(flash: Peri<'static, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }
}

impl NvBackend for Stm32NvStorage {
    fn load(&mut self, image: &mut [u8]) -> Result<()> {
        if image.len() > CONFIG_PARTITION_SIZE {
            return Err(HalError::OutOfRange);
        }
        self.flash
            .blocking_read(CONFIG_PARTITION_START as u32, image)
            .map_err(|_| HalError::Storage)
    }

    fn store(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > CONFIG_PARTITION_SIZE || image.len() % WRITE_SIZE != 0 {
            return Err(HalError::OutOfRange);
        }
        let start = CONFIG_PARTITION_START as u32;
        self.flash
            .blocking_erase(start, start + CONFIG_PARTITION_SIZE as u32)
            .and_then(|()| self.flash.blocking_write(start, image))
            .map_err(|_| {
                warn!("NVRAM page write failed");
                HalError::Storage
            })?;
        debug!("NVRAM page programmed, {} bytes", image.len());
        Ok(())
    }
}
