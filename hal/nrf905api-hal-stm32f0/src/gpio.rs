//! GPIO port for STM32F0
//!
//! Pins are numbered `port * 16 + pin`, so PA4 is 4 and PB1 is 17. Only
//! the pins of the radio wiring are taken; SPI1 and SWD pins stay out.

use embassy_stm32::gpio::{Flex, Level as StmLevel, Pull, Speed};
use embassy_stm32::Peri;
use nrf905api_hal::{Edge, EdgeDispatcher, GpioPort, InterruptHandler, Level, PinMode};

/// Port A and B
pub const GPIO_COUNT: usize = 32;

/// Interrupt slots
pub const IRQ_SLOTS: usize = 3;

/// Pin number for `port` ('A' or 'B') and `pin` 0-15
pub const fn pin_number(port: char, pin: u8) -> u8 {
    let base = match port {
        'B' => 16,
        _ => 0,
    };
    base + (pin & 0x0F)
}

/// Port letter and pin of a pin number
pub fn pin_name(pin: u8) -> (char, u8) {
    let port = if pin < 16 { 'A' } else { 'B' };
    (port, pin % 16)
}

pub struct Stm32Gpio {
    pins: [Option<Flex<'static>>; GPIO_COUNT],
    dispatcher: EdgeDispatcher<IRQ_SLOTS>,
}

impl Stm32Gpio {
    pub fn new() -> Self {
        Self {
            pins: [const { None }; GPIO_COUNT],
            dispatcher: EdgeDispatcher::new(),
        }
    }

    /// Make `pin` available under `number`
    pub fn add(&mut self, number: u8, pin: Peri<'static, impl embassy_stm32::gpio::Pin>) {
        if let Some(slot) = self.pins.get_mut(number as usize) {
            *slot = Some(Flex::new(pin));
        }
    }

    fn pin(&mut self, pin: u8) -> Option<&mut Flex<'static>> {
        let flex = self.pins.get_mut(pin as usize).and_then(Option::as_mut);
        if flex.is_none() {
            warn!("GPIO P{}{} not available", pin_name(pin).0, pin_name(pin).1);
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

impl Default for Stm32Gpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioPort for Stm32Gpio {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        let Some(flex) = self.pin(pin) else {
            return;
        };
        match mode {
            PinMode::Input => flex.set_as_input(Pull::None),
            PinMode::InputPullUp => flex.set_as_input(Pull::Up),
            PinMode::InputPullDown => flex.set_as_input(Pull::Down),
            PinMode::Output => flex.set_as_output(Speed::High),
            PinMode::OutputOpenDrain => flex.set_as_input_output(Speed::High),
        }
    }

    fn write_pin(&mut self, pin: u8, level: Level) {
        if let Some(flex) = self.pin(pin) {
            flex.set_level(match level {
                Level::Low => StmLevel::Low,
                Level::High => StmLevel::High,
            });
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

