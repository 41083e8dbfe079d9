//! nRF905 board hardware abstraction layer
//!
//! Target-independent half of the HAL: the [`Board`] facade, the SPI
//! transaction engine, the NVRAM working copy, interrupt bookkeeping and the
//! trait seams each target backend implements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Radio control / web API firmware       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  nrf905api-hal (this crate - Board)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ nrf905api-hal-│       │ nrf905api-hal-│
//! │    rp2040     │       │   stm32f0     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::GpioPort`] - Pin mode, level and interrupt access by number
//! - [`spi::SpiHost`] - SPI peripheral data path
//! - [`nvram::NvBackend`] - Durable storage behind the NVRAM working copy
//! - [`system::SystemInfo`], [`system::Network`] - Runtime collaborators
//! - [`board::Platform`] - Bundles one target's implementations

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod board;
pub mod config;
pub mod error;
pub mod gpio;
pub mod interrupt;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod nvram;
pub mod spi;
pub mod system;

// Re-export key types at crate root for convenience
pub use board::{Board, Parts, Platform};
pub use config::{BoardPins, PinConflict};
pub use error::{ErrorKind, HalError, Result};
pub use gpio::{Edge, GpioPort, InterruptHandler, Level, PinMode};
pub use interrupt::{EdgeDispatcher, ReservedLine};
pub use nvram::{NvBackend, NvRam, ERASED};
pub use spi::{BitOrder, ChipSelectLevel, Mode, SpiEngine, SpiHost, SpiPins, SpiSettings};
pub use system::{
    FlashCheck, FlashMode, Hostname, MemoryStats, Network, ResetReason, RestartReport,
    SketchSpace, SystemInfo,
};
