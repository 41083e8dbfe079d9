//! Network identity
//!
//! Holds the hostname. With the `ipv6` feature a stable MAC is derived from
//! the flash unique id and, once IPv6 is enabled, the link-local address
//! follows from that MAC.

use nrf905api_hal::{Hostname, Network, Result};

pub const DEFAULT_HOSTNAME: &str = "nrf905api";

pub struct Rp2040Network {
    hostname: Hostname,
    #[cfg(feature = "ipv6")]
    mac: [u8; 6],
    #[cfg(feature = "ipv6")]
    ipv6: bool,
}

impl Rp2040Network {
    #[cfg_attr(not(feature = "ipv6"), allow(unused_variables))]
    pub fn new(unique_id: u64) -> Self {
        Self {
            hostname: Hostname::new(DEFAULT_HOSTNAME).unwrap_or_default(),
            #[cfg(feature = "ipv6")]
            mac: nrf905api_hal::system::mac_from_unique_id(unique_id),
            #[cfg(feature = "ipv6")]
            ipv6: false,
        }
    }
}

impl Network for Rp2040Network {
    fn hostname(&self) -> &str {
        self.hostname.as_str()
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        self.hostname.set(hostname)
    }

    #[cfg(feature = "ipv6")]
    fn local_ipv6(&self) -> Result<core::net::Ipv6Addr> {
        if self.ipv6 {
            Ok(nrf905api_hal::system::link_local_from_mac(self.mac))
        } else {
            Err(nrf905api_hal::HalError::NotFound)
        }
    }

    #[cfg(feature = "ipv6")]
    fn enable_ipv6(&mut self) -> bool {
        self.ipv6 = true;
        true
    }
}
