//! GPIO port over the pin bank
//!
//! Every bank pin becomes a [`Flex`] so its direction can follow
//! `set_pin_mode`. Interrupt handlers are dispatched from
//! [`Rp2040Gpio::service_interrupts`], which the firmware calls from a
//! high-rate ticker task.

use embassy_rp::gpio::{Flex, Level as RpLevel, Pull};
use nrf905api_hal::{Edge, EdgeDispatcher, GpioPort, InterruptHandler, Level, PinMode};

use crate::pins::{PinBank, GPIO_COUNT};

/// Interrupt slots; the radio needs DR, CD and AM at most
pub const IRQ_SLOTS: usize = 4;

pub struct Rp2040Gpio {
    pins: [Option<Flex<'static>>; GPIO_COUNT],
    open_drain: u32,
    dispatcher: EdgeDispatcher<IRQ_SLOTS>,
}

fn to_rp(level: Level) -> RpLevel {
    match level {
        Level::Low => RpLevel::Low,
        Level::High => RpLevel::High,
    }
}

impl Rp2040Gpio {
    /// Take every pin left in `bank`
    pub fn new(bank: &mut PinBank) -> Self {
        let mut pins: [Option<Flex<'static>>; GPIO_COUNT] = [const { None }; GPIO_COUNT];
        for (n, pin) in bank.drain() {
            pins[n as usize] = Some(Flex::new(pin));
        }
        Self {
            pins,
            open_drain: 0,
            dispatcher: EdgeDispatcher::new(),
        }
    }

    fn pin(&mut self, pin: u8) -> Option<&mut Flex<'static>> {
        let flex = self.pins.get_mut(pin as usize).and_then(Option::as_mut);
        if flex.is_none() {
            warn!("GPIO {} not available", pin);
        }
        flex
    }

    /// Sample attached pins and run handlers for new edges
    pub fn service_interrupts(&mut self) -> usize {
        let pins = &self.pins;
        self.dispatcher.service(|pin| {
            pins.get(pin as usize)
                .and_then(Option::as_ref)
                .map_or(Level::Low, |flex| Level::from(flex.is_high()))
        })
    }
}

impl GpioPort for Rp2040Gpio {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        let Some(flex) = self.pin(pin) else {
            return;
        };
        match mode {
            PinMode::Input => {
                flex.set_pull(Pull::None);
                flex.set_as_input();
            }
            PinMode::InputPullUp => {
                flex.set_pull(Pull::Up);
                flex.set_as_input();
            }
            PinMode::InputPullDown => {
                flex.set_pull(Pull::Down);
                flex.set_as_input();
            }
            PinMode::Output => {
                flex.set_pull(Pull::None);
                flex.set_as_output();
            }
            PinMode::OutputOpenDrain => {
                // Emulated: drive low as output, release as input
                flex.set_pull(Pull::Up);
                flex.set_low();
                flex.set_as_input();
            }
        }
        let bit = 1u32 << pin;
        if mode == PinMode::OutputOpenDrain {
            self.open_drain |= bit;
        } else {
            self.open_drain &= !bit;
        }
    }

    fn write_pin(&mut self, pin: u8, level: Level) {
        let open_drain = self.open_drain & (1u32 << (pin & 31)) != 0;
        let Some(flex) = self.pin(pin) else {
            return;
        };
        if open_drain {
            match level {
                Level::Low => flex.set_as_output(),
                Level::High => flex.set_as_input(),
            }
        } else {
            flex.set_level(to_rp(level));
        }
    }

    fn read_pin(&mut self, pin: u8) -> Level {
        self.pin(pin)
            .map_or(Level::Low, |flex| Level::from(flex.is_high()))
    }

    fn attach_interrupt(&mut self, pin: u8, handler: InterruptHandler, edge: Edge) {
        if self.pin(pin).is_some() {
            self.dispatcher.attach(pin, handler, edge);
        }
    }

    fn detach_interrupt(&mut self, pin: u8) {
        self.dispatcher.detach(pin);
    }
}
