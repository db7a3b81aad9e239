//! Startup self-relocation.
//!
//! The boot ROM places the bootloader at the same address images are executed from. Before doing
//! anything else the bootloader copies itself to its permanent residence, points the reset vector
//! of the copy at the real entry routine and jumps there. Afterwards the whole execution region is
//! free for images.

use void::Void;

use crate::{
    hardware::{processor::Processor, processor::VectorTable, Config, Region},
    log, Address,
};

#[cfg(feature = "use-defmt")]
use defmt::Format;

const WORD: usize = core::mem::size_of::<u32>();

#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum RelocationError {
    /// Region start or size is not a multiple of the word size
    Misaligned(Address),
    /// The source is too short to hold a vector table
    TooSmall,
    /// The destination is smaller than the source
    DoesNotFit { source: usize, destination: usize },
    /// Source and destination share memory
    Overlap,
}

/// Copy `source` word by word to the start of `destination` and patch the entry point of the
/// copy's vector table to `entry`. Returns the vector table of the copy.
pub fn copy_image(
    source: &[u32],
    destination: &mut [u32],
    entry: Address,
) -> Result<VectorTable, RelocationError> {
    if source.len() < 2 {
        return Err(RelocationError::TooSmall);
    }
    if destination.len() < source.len() {
        return Err(RelocationError::DoesNotFit {
            source: source.len() * WORD,
            destination: destination.len() * WORD,
        });
    }

    for (to, from) in destination.iter_mut().zip(source) {
        *to = *from;
    }
    destination[1] = entry;

    VectorTable::from_words(destination).ok_or(RelocationError::TooSmall)
}

/// Phase one of the startup: relocate and jump into the copy, which lives at `address`. Only
/// returns if the copy could not be made.
pub fn relocate_from<CPU: Processor>(
    processor: &mut CPU,
    source: &[u32],
    destination: &mut [u32],
    address: Address,
    entry: Address,
) -> Result<Void, RelocationError> {
    let vectors = copy_image(source, destination, entry)?;
    log::info!(
        "Relocated {} bytes to 0x{:x}, entry 0x{:x}",
        source.len() * WORD,
        address,
        vectors.entry_point
    );
    processor.do_jump(address)
}

fn check(region: &Region) -> Result<(), RelocationError> {
    if region.location as usize % WORD != 0 || region.size as usize % WORD != 0 {
        return Err(RelocationError::Misaligned(region.location));
    }
    Ok(())
}

/// Relocate the running bootloader from `config.bootloader_load` to `config.bootloader` and
/// continue in `entry` there.
///
/// # Safety
/// Must run before anything else uses either region: the load region has to hold the bootloader
/// image and the resident region is overwritten. Both regions must be valid memory on the current
/// device.
pub unsafe fn relocate<CPU: Processor>(
    processor: &mut CPU,
    config: &Config,
    entry: extern "C" fn() -> !,
) -> Result<Void, RelocationError> {
    let from = config.bootloader_load;
    let to = config.bootloader;

    check(&from)?;
    check(&to)?;
    if from.overlaps(&to) {
        return Err(RelocationError::Overlap);
    }

    let source = core::slice::from_raw_parts(
        from.location as usize as *const u32,
        from.size as usize / WORD,
    );
    let destination = core::slice::from_raw_parts_mut(
        to.location as usize as *mut u32,
        to.size as usize / WORD,
    );

    relocate_from(
        processor,
        source,
        destination,
        to.location,
        entry as usize as Address,
    )
}
