//! Interrupt bookkeeping
//!
//! Two pieces live here:
//!
//! - [`AttachmentRecord`] remembers whether a handler is attached to each of
//!   the two reserved radio signal lines, so that detaching an unattached
//!   line never reaches the platform.
//! - [`EdgeDispatcher`] is the handler table a target backend uses to turn
//!   sampled pin levels into handler calls.

use heapless::Vec;

use crate::gpio::{Edge, InterruptHandler, Level};

/// Radio signal lines with interrupt bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReservedLine {
    /// nRF905 CD (carrier detect)
    CarrierDetect,
    /// nRF905 DR (data ready)
    DataReady,
}

/// Attachment state of the reserved lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttachmentRecord {
    carrier_detect_pin: u8,
    data_ready_pin: u8,
    carrier_detect: bool,
    data_ready: bool,
}

impl AttachmentRecord {
    pub const fn new(carrier_detect_pin: u8, data_ready_pin: u8) -> Self {
        Self {
            carrier_detect_pin,
            data_ready_pin,
            carrier_detect: false,
            data_ready: false,
        }
    }

    /// Reserved line on `pin`, if any
    pub fn line(&self, pin: u8) -> Option<ReservedLine> {
        if pin == self.carrier_detect_pin {
            Some(ReservedLine::CarrierDetect)
        } else if pin == self.data_ready_pin {
            Some(ReservedLine::DataReady)
        } else {
            None
        }
    }

    pub fn is_attached(&self, line: ReservedLine) -> bool {
        match line {
            ReservedLine::CarrierDetect => self.carrier_detect,
            ReservedLine::DataReady => self.data_ready,
        }
    }

    pub fn set_attached(&mut self, line: ReservedLine, attached: bool) {
        match line {
            ReservedLine::CarrierDetect => self.carrier_detect = attached,
            ReservedLine::DataReady => self.data_ready = attached,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    pin: u8,
    handler: InterruptHandler,
    edge: Edge,
    last: Option<Level>,
}

/// Edge detection and handler table
///
/// Holds up to `SLOTS` attached pins. [`service`](Self::service) samples
/// each attached pin and fires its handler on a matching transition. The
/// first sample after attaching only primes the detector.
#[derive(Debug, Default)]
pub struct EdgeDispatcher<const SLOTS: usize> {
    slots: Vec<Slot, SLOTS>,
}

impl<const SLOTS: usize> EdgeDispatcher<SLOTS> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Attach or replace the handler on `pin`
    ///
    /// Returns `false` if the table is full.
    pub fn attach(&mut self, pin: u8, handler: InterruptHandler, edge: Edge) -> bool {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.pin == pin) {
            slot.handler = handler;
            slot.edge = edge;
            return true;
        }
        let pushed = self
            .slots
            .push(Slot {
                pin,
                handler,
                edge,
                last: None,
            })
            .is_ok();
        if !pushed {
            warn!("Interrupt table full, pin {} not attached", pin);
        }
        pushed
    }

    /// Detach `pin`. Returns `true` if it was attached.
    pub fn detach(&mut self, pin: u8) -> bool {
        match self.slots.iter().position(|s| s.pin == pin) {
            Some(index) => {
                self.slots.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self, pin: u8) -> bool {
        self.slots.iter().any(|s| s.pin == pin)
    }

    /// Number of attached pins
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sample attached pins with `read` and run handlers for matching edges
    ///
    /// Returns the number of handlers fired.
    pub fn service<F: FnMut(u8) -> Level>(&mut self, mut read: F) -> usize {
        let mut fired = 0;
        for slot in self.slots.iter_mut() {
            let now = read(slot.pin);
            if let Some(prev) = slot.last {
                if slot.edge.matches(prev, now) {
                    (slot.handler)();
                    fired += 1;
                }
            }
            slot.last = Some(now);
        }
        fired
    }
}
