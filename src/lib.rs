#![cfg_attr(not(test), no_std)]

pub mod boot;
pub mod hardware;
pub mod image;
pub mod manager;
pub mod relocate;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use embedded_storage;

/// The bootloader runs at every reset, ...
pub use boot as left_boot;
/// ... the manager runs inside the firmware it booted.
pub use manager as right_boot;

// Address type in RAM or ROM
pub type Address = u32;

/// Bundles the collaborator types the bootloader and the manager are generic over.
pub trait Context {
    /// Filesystem holding the boot record and both firmware images
    type FileSystem: storage::FileSystem;
    /// Memory backing the execution region images are loaded into
    type Memory: embedded_storage::Storage<Error: core::fmt::Debug>;
    /// Processor performing the final jump or the reset
    type Processor: hardware::processor::Processor;
}

#[cfg(feature = "use-defmt")]
pub(crate) use defmt as log;

#[cfg(feature = "use-log")]
pub(crate) use logger_crate as log;

#[cfg(not(any(feature = "use-log", feature = "use-defmt")))]
pub(crate) mod log {
    macro_rules! info {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use info;
    macro_rules! trace {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use trace;
    macro_rules! error {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use error;
    macro_rules! warner {
        ( $( $x:expr ),* $(,)? ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use warner as warn;
}
