use embedded_storage::{ReadStorage, Storage};

use crate::{hardware::Region, Address};

#[cfg(feature = "use-defmt")]
use defmt::Format;

/// Access outside of the region
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct OutOfBounds {
    pub offset: Address,
    pub length: usize,
}

/// Directly addressed RAM, e.g. the execution region images are loaded into. Offsets are
/// relative to the start of the region.
pub struct RamRegion {
    region: Region,
}

impl RamRegion {
    /// # Safety
    /// The whole region must be valid, writable memory not used by anything else for as long as
    /// this instance lives.
    pub unsafe fn new(region: Region) -> Self {
        Self { region }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    fn check(&self, offset: Address, length: usize) -> Result<usize, OutOfBounds> {
        let end = offset as u64 + length as u64;
        if end > self.region.size as u64 {
            return Err(OutOfBounds { offset, length });
        }
        Ok(self.region.location as usize + offset as usize)
    }
}

impl ReadStorage for RamRegion {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let address = self.check(offset, bytes.len())?;
        unsafe {
            core::ptr::copy_nonoverlapping(address as *const u8, bytes.as_mut_ptr(), bytes.len());
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.region.size as usize
    }
}

impl Storage for RamRegion {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let address = self.check(offset, bytes.len())?;
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
        }
        Ok(())
    }
}
