//! Network identity
//!
//! No network stack runs on this target. Only the hostname is kept;
//! IPv6 reports `Unsupported`.

use nrf905api_hal::{Hostname, Network, Result};

pub const DEFAULT_HOSTNAME: &str = "nrf905api";

pub struct Stm32Network {
    hostname: Hostname,
}

impl Stm32Network {
    pub fn new() -> Self {
        Self {
            hostname: Hostname::new(DEFAULT_HOSTNAME).unwrap_or_default(),
        }
    }
}

impl Default for Stm32Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network for Stm32Network {
    fn hostname(&self) -> &str {
        self.hostname.as_str()
    }

    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        self.hostname.set(hostname)
    }
}
