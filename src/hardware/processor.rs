use crate::Address;

#[cfg(feature = "use-defmt")]
use defmt::Format;

/// The two leading words of every image: initial stack pointer and entry point.
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[repr(C)]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct VectorTable {
    pub stack_pointer: u32,
    pub entry_point: u32,
}

impl VectorTable {
    pub fn from_words(words: &[u32]) -> Option<Self> {
        match words {
            [stack_pointer, entry_point, ..] => Some(Self {
                stack_pointer: *stack_pointer,
                entry_point: *entry_point,
            }),
            _ => None,
        }
    }

    /// Read the vector table of the image located at `address`.
    ///
    /// # Safety
    /// `address` must be word aligned and point to two readable words.
    pub unsafe fn read(address: Address) -> Self {
        let words = address as usize as *const u32;
        Self {
            stack_pointer: core::ptr::read_volatile(words),
            entry_point: core::ptr::read_volatile(words.add(1)),
        }
    }
}

// This trait executes an execution jump to the specified starting address.
// The implementation is ISA-dependent.
pub trait Processor {
    /// Treat the two words at `address` as a [`VectorTable`], load the stack pointer and branch to
    /// the entry point. Never returns to the caller.
    fn do_jump(&mut self, address: Address) -> !;
    /// Unconditional hardware reset. Never returns to the caller.
    fn reset(&mut self) -> !;
    fn setup(&mut self, config: &crate::hardware::Config);
}

#[cfg(feature = "cortex-m")]
mod cortex_m {
    use super::{Processor, VectorTable};
    use crate::log;

    pub struct CortexM {}

    impl CortexM {
        pub fn new() -> Self {
            Self {}
        }
    }

    impl Default for CortexM {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Processor for CortexM {
        fn do_jump(&mut self, address: super::Address) -> ! {
            unsafe {
                let vectors = VectorTable::read(address);
                log::trace!(
                    "Vector table at 0x{:x}: sp 0x{:x}, entry 0x{:x}",
                    address,
                    vectors.stack_pointer,
                    vectors.entry_point
                );

                // Set Vector Table to new vector table (unsafe but okay here)
                (*cortex_m::peripheral::SCB::PTR).vtor.write(address);
                cortex_m::asm::dsb();
                cortex_m::asm::isb();

                cortex_m::asm::bootstrap(
                    vectors.stack_pointer as *const u32,
                    vectors.entry_point as *const u32,
                );
            }
        }

        fn reset(&mut self) -> ! {
            cortex_m::peripheral::SCB::sys_reset()
        }

        fn setup(&mut self, _config: &crate::hardware::Config) {
            // Interrupts stay masked for the whole decision sequence
            cortex_m::interrupt::disable();
        }
    }
}

#[cfg(feature = "cortex-m")]
// A Processor implementation for use with cortex-m processors
pub use self::cortex_m::CortexM;
