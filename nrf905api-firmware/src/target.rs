//! Target selection
//!
//! Exactly one of the `rp2040` and `stm32f0` features picks the backend.

use nrf905api_hal::{Board, Parts};

#[cfg(all(feature = "rp2040", feature = "stm32f0"))]
compile_error!("features `rp2040` and `stm32f0` are mutually exclusive");

#[cfg(feature = "rp2040")]
pub use nrf905api_hal_rp2040::{Rp2040Gpio as Gpio, Rp2040Platform as Platform, NVRAM_SIZE};

#[cfg(feature = "stm32f0")]
pub use nrf905api_hal_stm32f0::{Stm32Gpio as Gpio, Stm32Platform as Platform, NVRAM_SIZE};

pub type TargetBoard = Board<Platform, NVRAM_SIZE>;

#[cfg(feature = "rp2040")]
mod heap {
    use core::mem::MaybeUninit;
    use embedded_alloc::LlffHeap as Heap;

    // Only sized for the memory statistics; nothing allocates yet
    #[global_allocator]
    pub static HEAP: Heap = Heap::empty();

    const HEAP_SIZE: usize = 8 * 1024;

    pub fn init() {
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        #[allow(static_mut_refs)]
        unsafe {
            HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
        }
    }
}

/// Initialize the chip and hand out the board components
#[cfg(feature = "rp2040")]
pub fn init() -> Parts<Platform> {
    heap::init();
    let p = embassy_rp::init(Default::default());
    let mut parts = nrf905api_hal_rp2040::init(p);
    parts.system = parts
        .system
        .with_heap(&heap::HEAP)
        .with_build_timestamp(crate::config::BUILD_TIMESTAMP);
    parts
}

/// Initialize the chip and hand out the board components
#[cfg(feature = "stm32f0")]
pub fn init() -> Parts<Platform> {
    let p = embassy_stm32::init(Default::default());
    let mut parts = nrf905api_hal_stm32f0::init(p, nrf905api_hal_stm32f0::DEFAULT_CPU_MHZ);
    parts.system = parts
        .system
        .with_build_timestamp(crate::config::BUILD_TIMESTAMP);
    parts
}

/// Poll the attached interrupt lines
pub fn service_interrupts(gpio: &mut Gpio) -> usize {
    gpio.service_interrupts()
}
