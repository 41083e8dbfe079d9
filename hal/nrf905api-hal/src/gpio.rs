//! GPIO pin abstractions
//!
//! Pins are addressed by number so that the pin map can come from
//! configuration. Each target backend implements [`GpioPort`] over its own
//! pin table.

use core::ops::Not;

/// Logic level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Pin direction and pull configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Floating input
    Input,
    /// Input with internal pull-up
    InputPullUp,
    /// Input with internal pull-down
    InputPullDown,
    /// Push-pull output
    Output,
    /// Open-drain output
    OutputOpenDrain,
}

impl PinMode {
    pub fn is_output(self) -> bool {
        matches!(self, PinMode::Output | PinMode::OutputOpenDrain)
    }
}

/// Edge that triggers an attached interrupt handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high transition
    Rising,
    /// High to low transition
    Falling,
    /// Any transition
    Change,
}

impl Edge {
    /// Check whether a `from` -> `to` transition fires this edge
    pub fn matches(self, from: Level, to: Level) -> bool {
        match self {
            Edge::Rising => from.is_low() && to.is_high(),
            Edge::Falling => from.is_high() && to.is_low(),
            Edge::Change => from != to,
        }
    }
}

/// Interrupt callback
///
/// Handlers run in a restricted context that may have preempted the main
/// flow in the middle of an SPI transaction. A handler must not allocate,
/// block, touch the SPI bus or commit storage. Set a flag or signal and
/// return.
pub type InterruptHandler = fn();

/// Per-target GPIO access by pin number
///
/// Invalid pin numbers are a caller contract violation; implementations may
/// ignore them or log, but never report them upward.
pub trait GpioPort {
    /// Configure direction and pull for a pin
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode);

    /// Drive an output pin
    fn write_pin(&mut self, pin: u8, level: Level);

    /// Sample a pin
    fn read_pin(&mut self, pin: u8) -> Level;

    /// Register `handler` for `edge` on `pin`, replacing any previous handler
    fn attach_interrupt(&mut self, pin: u8, handler: InterruptHandler, edge: Edge);

    /// Unregister the handler on `pin`
    fn detach_interrupt(&mut self, pin: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(!Level::High, Level::Low);
        assert!(Level::High.is_high());
        assert!(Level::Low.is_low());
    }

    #[test]
    fn test_edge_matching() {
        assert!(Edge::Rising.matches(Level::Low, Level::High));
        assert!(!Edge::Rising.matches(Level::High, Level::Low));
        assert!(Edge::Falling.matches(Level::High, Level::Low));
        assert!(!Edge::Falling.matches(Level::Low, Level::Low));
        assert!(Edge::Change.matches(Level::High, Level::Low));
        assert!(Edge::Change.matches(Level::Low, Level::High));
        assert!(!Edge::Change.matches(Level::High, Level::High));
    }
}
