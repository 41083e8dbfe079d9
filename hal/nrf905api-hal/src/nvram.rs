//! Persistent storage region
//!
//! A flat, byte-addressed configuration store. Reads and writes go to a
//! RAM working copy; nothing is durable until [`NvRam::commit`]. Callers
//! that skip the commit lose their changes on the next reset.
//!
//! Blank storage reads as [`ERASED`], and [`NvRam::clear`] writes that same
//! value across the whole region.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{HalError, Result};

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

/// Largest serialized record accepted by [`NvRam::store_record`]
pub const MAX_RECORD_SIZE: usize = 256;

/// Record header: little-endian payload length
const RECORD_HEADER_SIZE: usize = 2;

/// Durable backing for the working copy
///
/// Implementations persist the whole image; they may skip unchanged parts.
pub trait NvBackend {
    /// Fill `image` from durable storage. Blank storage reads as [`ERASED`].
    fn load(&mut self, image: &mut [u8]) -> Result<()>;

    /// Make `image` durable
    fn store(&mut self, image: &[u8]) -> Result<()>;
}

/// Working copy of the storage region
pub struct NvRam<B, const N: usize> {
    backend: B,
    image: [u8; N],
    dirty: bool,
}

impl<B: NvBackend, const N: usize> NvRam<B, N> {
    /// Load the durable image into a new working copy
    ///
    /// If the backend cannot be read the working copy starts erased.
    pub fn new(mut backend: B) -> Self {
        let mut image = [ERASED; N];
        if let Err(_e) = backend.load(&mut image) {
            warn!("NVRAM load failed ({}), starting erased", _e);
            image = [ERASED; N];
        }
        Self {
            backend,
            image,
            dirty: false,
        }
    }

    /// Region size in bytes
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// True if the working copy differs from what was last loaded or committed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn range(offset: usize, size: usize) -> Result<core::ops::Range<usize>> {
        match offset.checked_add(size) {
            Some(end) if end <= N => Ok(offset..end),
            _ => Err(HalError::OutOfRange),
        }
    }

    /// Copy `buffer.len()` bytes starting at `offset` into `buffer`
    pub fn read(&self, buffer: &mut [u8], offset: usize) -> Result<()> {
        let range = Self::range(offset, buffer.len())?;
        buffer.copy_from_slice(&self.image[range]);
        Ok(())
    }

    /// Copy `data` into the working copy at `offset`
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<()> {
        let range = Self::range(offset, data.len())?;
        let target = &mut self.image[range];
        if target != data {
            target.copy_from_slice(data);
            self.dirty = true;
        }
        Ok(())
    }

    /// Set every byte of the working copy to [`ERASED`]
    pub fn clear(&mut self) {
        if self.image.iter().any(|&b| b != ERASED) {
            self.image.fill(ERASED);
            self.dirty = true;
        }
    }

    /// Flush the working copy to durable storage
    ///
    /// Does not touch the backend when nothing changed.
    pub fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            debug!("NVRAM commit skipped, nothing changed");
            return Ok(());
        }
        self.backend.store(&self.image)?;
        self.dirty = false;
        debug!("NVRAM committed {} bytes", N);
        Ok(())
    }

    /// Serialize `value` at `offset` behind a length header
    ///
    /// Returns the number of bytes used, header included. Like
    /// [`write`](Self::write), the record is not durable until committed.
    pub fn store_record<T: Serialize>(&mut self, offset: usize, value: &T) -> Result<usize> {
        let mut scratch = [0u8; MAX_RECORD_SIZE];
        let payload = postcard::to_slice(value, &mut scratch).map_err(|_| HalError::Encoding)?;
        let len = payload.len();

        Self::range(offset, RECORD_HEADER_SIZE + len)?;
        self.write(&(len as u16).to_le_bytes(), offset)?;
        self.write(payload, offset + RECORD_HEADER_SIZE)?;
        Ok(RECORD_HEADER_SIZE + len)
    }

    /// Deserialize a record written by [`store_record`](Self::store_record)
    pub fn load_record<T: DeserializeOwned>(&self, offset: usize) -> Result<T> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.read(&mut header, offset)?;
        let len = u16::from_le_bytes(header);
        if len == u16::MAX {
            return Err(HalError::NotFound);
        }

        let start = offset + RECORD_HEADER_SIZE;
        let range = Self::range(start, len as usize)?;
        postcard::from_bytes(&self.image[range]).map_err(|_| HalError::Encoding)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Drop the working copy and return the backend
    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNvBackend;
    use proptest::prelude::*;
    use serde::Deserialize;

    const SIZE: usize = 64;

    type TestNvRam = NvRam<MockNvBackend<SIZE>, SIZE>;

    /// Simulate a reset: drop the working copy, reload from durable storage
    fn reset(nvram: TestNvRam) -> TestNvRam {
        NvRam::new(nvram.into_backend())
    }

    #[test]
    fn test_blank_reads_erased() {
        let nvram = TestNvRam::new(MockNvBackend::new());
        let mut buf = [0u8; 8];
        nvram.read(&mut buf, 0).unwrap();
        assert_eq!(buf, [ERASED; 8]);
    }

    #[test]
    fn test_write_read_before_commit() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.write(b"nRF905", 10).unwrap();

        let mut buf = [0u8; 6];
        nvram.read(&mut buf, 10).unwrap();
        assert_eq!(&buf, b"nRF905");
        assert!(nvram.is_dirty());
        assert_eq!(nvram.backend().store_count(), 0);
    }

    #[test]
    fn test_commit_survives_reset() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.write(&[1, 2, 3, 4], 20).unwrap();
        nvram.commit().unwrap();

        let nvram = reset(nvram);
        let mut buf = [0u8; 4];
        nvram.read(&mut buf, 20).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_uncommitted_write_lost_on_reset() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.write(&[0xAB], 0).unwrap();

        let nvram = reset(nvram);
        let mut buf = [0u8; 1];
        nvram.read(&mut buf, 0).unwrap();
        assert_eq!(buf, [ERASED]);
    }

    #[test]
    fn test_clear_fills_erased() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.write(&[0u8; SIZE], 0).unwrap();
        nvram.clear();

        let mut buf = [0u8; SIZE];
        nvram.read(&mut buf, 0).unwrap();
        assert!(buf.iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        let mut buf = [0u8; 4];

        assert_eq!(nvram.read(&mut buf, SIZE - 3), Err(HalError::OutOfRange));
        assert_eq!(nvram.write(&buf, SIZE), Err(HalError::OutOfRange));
        assert_eq!(nvram.write(&buf, usize::MAX), Err(HalError::OutOfRange));
        // Exactly at the end is fine
        assert!(nvram.read(&mut buf, SIZE - 4).is_ok());
        assert!(nvram.read(&mut [], SIZE).is_ok());
    }

    #[test]
    fn test_commit_skips_unchanged() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.commit().unwrap();
        assert_eq!(nvram.backend().store_count(), 0);

        // Writing what is already there does not dirty the copy
        nvram.write(&[ERASED; 4], 0).unwrap();
        nvram.clear();
        nvram.commit().unwrap();
        assert_eq!(nvram.backend().store_count(), 0);

        nvram.write(&[7], 0).unwrap();
        nvram.commit().unwrap();
        nvram.commit().unwrap();
        assert_eq!(nvram.backend().store_count(), 1);
    }

    #[test]
    fn test_commit_failure_keeps_dirty() {
        let mut backend = MockNvBackend::new();
        backend.fail_store(true);
        let mut nvram = TestNvRam::new(backend);

        nvram.write(&[1], 0).unwrap();
        assert_eq!(nvram.commit(), Err(HalError::Storage));
        assert!(nvram.is_dirty());
    }

    #[test]
    fn test_load_failure_starts_erased() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        nvram.write(&[5, 6, 7], 10).unwrap();
        nvram.commit().unwrap();

        let mut backend = nvram.into_backend();
        backend.fail_load(true);
        let mut nvram = TestNvRam::new(backend);

        let mut buf = [0u8; 3];
        nvram.read(&mut buf, 10).unwrap();
        assert_eq!(buf, [ERASED; 3]);
        assert!(!nvram.is_dirty());

        // Nothing changed, so the durable copy is not overwritten
        nvram.commit().unwrap();
        assert_eq!(nvram.backend().store_count(), 1);
        assert_eq!(&nvram.backend().durable()[10..13], &[5, 6, 7]);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct RadioConfig {
        channel: u16,
        hfreq_pll: bool,
        tx_power: i8,
        address: [u8; 4],
    }

    #[test]
    fn test_record_round_trip() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        let config = RadioConfig {
            channel: 108,
            hfreq_pll: false,
            tx_power: 10,
            address: [0xE7, 0xE7, 0xE7, 0xE7],
        };

        let used = nvram.store_record(8, &config).unwrap();
        assert!(used > RECORD_HEADER_SIZE);
        nvram.commit().unwrap();

        let nvram = reset(nvram);
        let loaded: RadioConfig = nvram.load_record(8).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_record_missing() {
        let nvram = TestNvRam::new(MockNvBackend::new());
        let result: Result<RadioConfig> = nvram.load_record(0);
        assert_eq!(result, Err(HalError::NotFound));
    }

    #[test]
    fn test_record_too_large_for_region() {
        let mut nvram = TestNvRam::new(MockNvBackend::new());
        let value = [0x11u8; 32];
        assert_eq!(
            nvram.store_record(SIZE - 8, &value),
            Err(HalError::OutOfRange)
        );
    }

    proptest! {
        #[test]
        fn prop_in_range_write_reads_back(
            data in proptest::collection::vec(any::<u8>(), 0..SIZE),
            offset in 0..SIZE,
        ) {
            let mut nvram = TestNvRam::new(MockNvBackend::new());
            let result = nvram.write(&data, offset);

            if offset + data.len() <= SIZE {
                prop_assert!(result.is_ok());
                let mut buf = std::vec![0u8; data.len()];
                nvram.read(&mut buf, offset).unwrap();
                prop_assert_eq!(&buf, &data);
            } else {
                prop_assert_eq!(result, Err(HalError::OutOfRange));
            }
        }
    }
}
