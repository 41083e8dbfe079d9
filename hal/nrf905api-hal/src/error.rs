//! HAL error types
//!
//! Every fallible board operation reports one of these variants. Variants
//! fall into two groups, see [`ErrorKind`].

use core::fmt;

/// Result type for board operations
pub type Result<T> = core::result::Result<T, HalError>;

/// Coarse classification of a [`HalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// The caller broke an API precondition. Not recoverable by the HAL.
    ContractViolation,
    /// The platform cannot provide the resource or feature right now.
    PlatformUnavailable,
}

/// Errors from board operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// SPI transfer attempted before `begin`
    BusNotClaimed,
    /// SPI transfer attempted before frequency, bit order and data mode were set
    BusNotConfigured,
    /// Offset/size outside the storage region, or value too long
    OutOfRange,
    /// Pin number does not exist on this target
    InvalidPin,
    /// SPI peripheral or its pins are already claimed
    BusInUse,
    /// SPI peripheral reported a transfer failure
    Bus,
    /// Durable storage read/write failed
    Storage,
    /// Feature not implemented on this target
    Unsupported,
    /// Requested record or address is not present
    NotFound,
    /// Record could not be serialized or deserialized
    Encoding,
}

impl HalError {
    /// Classify this error
    pub const fn kind(self) -> ErrorKind {
        match self {
            HalError::BusNotClaimed
            | HalError::BusNotConfigured
            | HalError::OutOfRange
            | HalError::InvalidPin => ErrorKind::ContractViolation,
            HalError::BusInUse
            | HalError::Bus
            | HalError::Storage
            | HalError::Unsupported
            | HalError::NotFound
            | HalError::Encoding => ErrorKind::PlatformUnavailable,
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HalError::BusNotClaimed => "SPI bus not claimed",
            HalError::BusNotConfigured => "SPI bus not configured",
            HalError::OutOfRange => "offset or size out of range",
            HalError::InvalidPin => "invalid pin",
            HalError::BusInUse => "SPI bus already in use",
            HalError::Bus => "SPI transfer failed",
            HalError::Storage => "storage operation failed",
            HalError::Unsupported => "unsupported on this target",
            HalError::NotFound => "not found",
            HalError::Encoding => "record encoding failed",
        };
        f.write_str(msg)
    }
}
