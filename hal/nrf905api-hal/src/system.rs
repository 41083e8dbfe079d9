//! Platform runtime and network collaborators
//!
//! These are pure forwards to the target runtime. Values the target cannot
//! produce come back as `None`, [`FlashCheck::Unchecked`] or
//! [`HalError::Unsupported`] rather than a made-up answer.

use core::fmt;

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

use crate::error::{HalError, Result};

/// Longest hostname accepted by [`Network::set_hostname`]
pub const MAX_HOSTNAME_LEN: usize = 32;

/// Why the chip last came out of reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    PowerOn,
    Watchdog,
    /// Requested by firmware
    Software,
    /// Reset pin
    External,
    /// Timed wake from deep sleep
    DeepSleepWake,
    Unknown,
}

impl ResetReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResetReason::PowerOn => "Power on",
            ResetReason::Watchdog => "Watchdog",
            ResetReason::Software => "Software/System restart",
            ResetReason::External => "External System",
            ResetReason::DeepSleepWake => "Deep-Sleep Wake",
            ResetReason::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reset cause per core, ready for a status page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RestartReport {
    pub cpu0: ResetReason,
}

/// Result of a firmware image integrity check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashCheck {
    Passed,
    Failed,
    /// The target has no integrity check
    Unchecked,
}

/// Flash bus width mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashMode {
    Qio,
    Qout,
    Dio,
    Dout,
    /// Internal flash, no external bus
    Internal,
    Unknown,
}

impl FlashMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlashMode::Qio => "QIO",
            FlashMode::Qout => "QOUT",
            FlashMode::Dio => "DIO",
            FlashMode::Dout => "DOUT",
            FlashMode::Internal => "INTERNAL",
            FlashMode::Unknown => "UNKNOWN",
        }
    }
}

/// Heap statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryStats {
    /// Free heap in bytes
    pub free: u32,
    /// Largest single allocation that would succeed
    pub largest_free_block: u32,
    /// 0 = unfragmented, 100 = fully fragmented
    pub fragmentation: u8,
}

impl MemoryStats {
    /// Build from free and largest-block sizes
    pub fn new(free: u32, largest_free_block: u32) -> Self {
        let fragmentation = if free == 0 {
            0
        } else {
            let largest = largest_free_block.min(free) as u64;
            (100 - (largest * 100 / free as u64)) as u8
        };
        Self {
            free,
            largest_free_block,
            fragmentation,
        }
    }
}

/// Flash taken by the running firmware image and the room left after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SketchSpace {
    pub used: u32,
    pub free: u32,
}

impl SketchSpace {
    /// Image linked at `origin` ending at `image_end`, which may grow up to
    /// `limit` (the start of whatever flash region follows it)
    pub fn new(origin: u32, image_end: u32, limit: u32) -> Self {
        let image_end = image_end.max(origin);
        Self {
            used: image_end - origin,
            free: limit.saturating_sub(image_end),
        }
    }
}

const IMAGE_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of a firmware image
pub fn image_checksum(image: &[u8]) -> u32 {
    IMAGE_CRC.checksum(image)
}

/// Flash size encoded in the capacity byte of a JEDEC id
///
/// Serial NOR parts report `log2(bytes)` in the low byte. Codes outside
/// 1 KiB..2 GiB are not capacities.
pub fn flash_size_from_jedec(jedec_id: u32) -> Option<u32> {
    match jedec_id & 0xFF {
        code @ 10..=31 => Some(1 << code),
        _ => None,
    }
}

/// Chip identity, clocks and power control
pub trait SystemInfo {
    /// Architecture name, e.g. `"rp2040"`
    fn arch(&self) -> &'static str;

    /// CPU clock in Hz
    fn cpu_freq_hz(&self) -> u32;

    /// Vendor SDK / HAL version
    fn sdk_version(&self) -> &'static str;

    /// Firmware core version
    fn core_version(&self) -> &'static str;

    /// Firmware core revision, if the build recorded one
    fn core_revision(&self) -> Option<u32> {
        None
    }

    /// Unique chip id
    fn cpu_id(&self) -> u64;

    /// JEDEC id of the flash chip
    fn flash_chip_id(&self) -> Option<u32>;

    /// Flash size in bytes
    fn flash_chip_size(&self) -> u32;

    /// Flash size the firmware was built for. Differs from
    /// [`flash_chip_size`](Self::flash_chip_size) when the fitted chip is
    /// not the one the build assumes.
    fn flash_chip_configured_size(&self) -> u32 {
        self.flash_chip_size()
    }

    /// Flash used by the firmware image and left for a larger one
    fn sketch_space(&self) -> Option<SketchSpace> {
        None
    }

    /// [`image_checksum`] over the firmware image
    fn sketch_checksum(&self) -> Option<u32> {
        None
    }

    /// When the firmware was built, in seconds since the Unix epoch
    fn build_timestamp(&self) -> Option<u64> {
        None
    }

    /// Flash clock in Hz
    fn flash_chip_speed(&self) -> Option<u32> {
        None
    }

    fn flash_mode(&self) -> FlashMode {
        FlashMode::Unknown
    }

    /// Verify the firmware image. Targets without a check report `Unchecked`.
    fn flash_check(&mut self) -> FlashCheck {
        FlashCheck::Unchecked
    }

    /// Supply voltage in millivolts
    fn supply_millivolts(&mut self) -> Option<u16> {
        None
    }

    /// Heap statistics, `None` without a heap
    fn memory(&self) -> Option<MemoryStats>;

    fn reset_reason(&self) -> ResetReason;

    /// Reset the chip
    fn restart(&mut self) -> !;

    /// Sleep for `micros` then come back through reset
    fn deep_sleep(&mut self, micros: u64) -> !;
}

/// Network stack collaborator
pub trait Network {
    fn hostname(&self) -> &str;

    /// Set the hostname. Longer than [`MAX_HOSTNAME_LEN`] is rejected.
    fn set_hostname(&mut self, hostname: &str) -> Result<()>;

    /// Link-local IPv6 address
    fn local_ipv6(&self) -> Result<core::net::Ipv6Addr> {
        Err(HalError::Unsupported)
    }

    /// Enable IPv6. Returns `false` when the target cannot.
    fn enable_ipv6(&mut self) -> bool {
        false
    }
}

/// Locally administered unicast MAC from a chip unique id
pub fn mac_from_unique_id(id: u64) -> [u8; 6] {
    let b = id.to_be_bytes();
    // Fold the top bytes in so ids differing only there stay distinct
    let mut mac = [b[2] ^ b[0], b[3] ^ b[1], b[4], b[5], b[6], b[7]];
    mac[0] = (mac[0] | 0x02) & !0x01;
    mac
}

/// fe80::/64 link-local address with a modified EUI-64 interface id
pub fn link_local_from_mac(mac: [u8; 6]) -> core::net::Ipv6Addr {
    let iid = [
        mac[0] ^ 0x02,
        mac[1],
        mac[2],
        0xFF,
        0xFE,
        mac[3],
        mac[4],
        mac[5],
    ];
    let mut octets = [0u8; 16];
    octets[0] = 0xFE;
    octets[1] = 0x80;
    octets[8..].copy_from_slice(&iid);
    core::net::Ipv6Addr::from(octets)
}

/// Hostname storage shared by network backends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hostname(heapless::String<MAX_HOSTNAME_LEN>);

impl Hostname {
    pub fn new(name: &str) -> Result<Self> {
        let mut hostname = Self::default();
        hostname.set(name)?;
        Ok(hostname)
    }

    pub fn set(&mut self, name: &str) -> Result<()> {
        let mut next = heapless::String::new();
        next.push_str(name).map_err(|_| HalError::OutOfRange)?;
        self.0 = next;
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_reason_text() {
        assert_eq!(ResetReason::DeepSleepWake.to_string(), "Deep-Sleep Wake");
        assert_eq!(ResetReason::Software.as_str(), "Software/System restart");
    }

    #[test]
    fn test_memory_fragmentation() {
        let stats = MemoryStats::new(1000, 250);
        assert_eq!(stats.fragmentation, 75);
        assert_eq!(MemoryStats::new(1000, 1000).fragmentation, 0);
        assert_eq!(MemoryStats::new(0, 0).fragmentation, 0);
    }

    #[test]
    fn test_sketch_space() {
        let space = SketchSpace::new(0x1000_0000, 0x1002_4000, 0x101F_0000);
        assert_eq!(space.used, 0x2_4000);
        assert_eq!(space.free, 0x1F_0000 - 0x2_4000);

        // An image running into the following region has no room left
        let full = SketchSpace::new(0x0800_0000, 0x0800_7F00, 0x0800_7C00);
        assert_eq!(full.free, 0);
        assert_eq!(SketchSpace::new(0x100, 0x80, 0x200).used, 0);
    }

    #[test]
    fn test_image_checksum() {
        assert_eq!(image_checksum(b"123456789"), 0xCBF4_3926);
        assert_eq!(image_checksum(&[]), 0);
    }

    #[test]
    fn test_flash_size_from_jedec() {
        // Winbond W25Q16JV on the Pico
        assert_eq!(flash_size_from_jedec(0x00EF_4015), Some(2 * 1024 * 1024));
        assert_eq!(flash_size_from_jedec(0x00EF_4018), Some(16 * 1024 * 1024));
        assert_eq!(flash_size_from_jedec(0x00FF_FFFF), None);
        assert_eq!(flash_size_from_jedec(0), None);
    }

    #[test]
    fn test_link_local_eui64() {
        let addr = link_local_from_mac([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);
        assert_eq!(
            addr,
            "fe80::21a:2bff:fe3c:4d5e".parse::<core::net::Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_mac_is_local_unicast() {
        let mac = mac_from_unique_id(0xE660_5838_8B2C_1A2B);
        assert_eq!(mac[0] & 0x03, 0x02);
        assert_eq!(&mac[2..], &[0x8B, 0x2C, 0x1A, 0x2B]);
        assert_ne!(mac_from_unique_id(1), mac_from_unique_id(2));
    }

    #[test]
    fn test_hostname_limits() {
        let mut name = Hostname::new("nrf905api").unwrap();
        assert_eq!(name.as_str(), "nrf905api");

        let long = "x".repeat(MAX_HOSTNAME_LEN + 1);
        assert_eq!(name.set(&long), Err(HalError::OutOfRange));
        // Rejected set leaves the old name
        assert_eq!(name.as_str(), "nrf905api");

        let exact = "y".repeat(MAX_HOSTNAME_LEN);
        assert!(name.set(&exact).is_ok());
    }
}
