//! NVRAM backend on the RP2040 flash
//!
//! The image is cut into 256-byte chunks stored as sequential-storage map
//! items (key = chunk index) in the last 64KB of flash, which gives wear
//! leveling for free. A commit only writes chunks that changed.

use embassy_futures::block_on;
use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use nrf905api_hal::{HalError, NvBackend, Result, ERASED};
use sequential_storage::cache::NoCache;
use sequential_storage::map;

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB flash on the Pico
pub const CONFIG_PARTITION_SIZE: usize = 64 * 1024; // 64KB for NVRAM
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Flash range for the NVRAM partition
pub const CONFIG_RANGE: core::ops::Range<u32> =
    (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Bytes per stored chunk
pub const CHUNK_SIZE: usize = 256;

/// Item buffer: chunk plus key and item header
const ITEM_BUFFER_SIZE: usize = CHUNK_SIZE + 32;

/// Identity of the external flash chip, read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashIdentity {
    pub jedec_id: Option<u32>,
    pub unique_id: u64,
}

pub struct Rp2040NvStorage {
    flash: Flash<'static, FLASH, Async, FLASH_SIZE>,
}

impl Rp2040NvStorage {
    pub fn new(flash: Peri<'static, FLASH>, dma: Peri<'static, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Read JEDEC and unique id from the flash chip
    pub fn identify(&mut self) -> FlashIdentity {
        let jedec_id = self.flash.blocking_jedec_id().ok();
        let mut uid = [0u8; 8];
        let unique_id = match self.flash.blocking_unique_id(&mut uid) {
            Ok(()) => u64::from_be_bytes(uid),
            Err(_) => 0,
        };
        FlashIdentity {
            jedec_id,
            unique_id,
        }
    }

    async fn fetch_chunk(&mut self, index: u8, chunk: &mut [u8]) -> Result<bool> {
        let mut buffer = [0u8; ITEM_BUFFER_SIZE];
        let item = map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut buffer,
            &index,
        )
        .await
        .map_err(|_| HalError::Storage)?;

        match item {
            Some(data) => {
                let len = data.len().min(chunk.len());
                chunk[..len].copy_from_slice(&data[..len]);
                chunk[len..].fill(ERASED);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn store_chunk(&mut self, index: u8, chunk: &[u8]) -> Result<()> {
        let mut buffer = [0u8; ITEM_BUFFER_SIZE];
        map::store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut buffer,
            &index,
            &chunk,
        )
        .await
        .map_err(|_| HalError::Storage)
    }
}

fn chunk_index(n: usize) -> Result<u8> {
    u8::try_from(n).map_err(|_| HalError::OutOfRange)
}

impl NvBackend for Rp2040NvStorage {
    fn load(&mut self, image: &mut [u8]) -> Result<()> {
        block_on(async {
            for (n, chunk) in image.chunks_mut(CHUNK_SIZE).enumerate() {
                if !self.fetch_chunk(chunk_index(n)?, chunk).await? {
                    chunk.fill(ERASED);
                }
            }
            Ok::<(), HalError>(())
        })
    }

    fn store(&mut self, image: &[u8]) -> Result<()> {
        block_on(async {
            let mut written = 0usize;
            let mut durable = [ERASED; CHUNK_SIZE];
            for (n, chunk) in image.chunks(CHUNK_SIZE).enumerate() {
                let index = chunk_index(n)?;
                let durable = &mut durable[..chunk.len()];
                if !self.fetch_chunk(index, durable).await? {
                    durable.fill(ERASED);
                }
                if durable != chunk {
                    self.store_chunk(index, chunk).await.inspect_err(|_| {
                        warn!("NVRAM chunk {} write failed", index);
                    })?;
                    written += 1;
                }
            }
            debug!("NVRAM commit wrote {} chunks", written);
            Ok::<(), HalError>(())
        })
    }
}
