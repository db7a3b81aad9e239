pub mod memory;
pub mod processor;

use crate::{state::ImageKind, Address};

#[cfg(feature = "use-defmt")]
use defmt::Format;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Path of the boot record in the filesystem
pub const STATE_PATH: &str = "boot.cfg";
/// Space reserved for the boot record file
pub const STATE_CAPACITY: u32 = 512;
pub const FACTORY_IMAGE_PATH: &str = "/sys/factory.bin";
pub const CUSTOM_IMAGE_PATH: &str = "/sys/custom.bin";

/// Start of SRAM on the reference device
pub const SRAM_ORIGIN: Address = 0x2000_0000;
/// Size of SRAM on the reference device
pub const SRAM_SIZE: Address = 0x4_0000;
/// Where the ROM places the bootloader and where images are executed from
pub const IMAGE_BASE_ADDRESS: Address = 0x2000_4000;
/// Space the bootloader occupies after relocating itself
pub const BOOTLOADER_SIZE: Address = 0x4000;

const WORD: Address = core::mem::size_of::<u32>() as Address;

#[cfg_attr(feature = "use-defmt", derive(Format))]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Region {
    /// Starting address of this region
    pub location: Address,
    /// Size of this region
    pub size: Address,
}

impl Region {
    pub const fn new(location: Address, size: Address) -> Self {
        Self { location, size }
    }

    /// First address past the region
    pub const fn end(&self) -> u64 {
        self.location as u64 + self.size as u64
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.location && (address as u64) < self.end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        (self.location as u64) < other.end() && (other.location as u64) < self.end()
    }

    fn is_word_aligned(&self) -> bool {
        self.location % WORD == 0 && self.size % WORD == 0
    }
}

/// A firmware image slot. Images are raw binaries starting with their vector table.
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Image {
    pub kind: ImageKind,
    /// File the image is stored in
    pub path: &'static str,
    /// Address the image is loaded to and executed from
    pub destination: Address,
}

#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Config {
    /// file holding the boot record
    pub state_path: &'static str,
    /// space allocated for the boot record file
    pub state_capacity: u32,
    pub factory: Image,
    pub custom: Image,
    /// section of RAM images are loaded to and run from
    pub execution: Region,
    /// where the bootloader lives after relocating itself
    pub bootloader: Region,
    /// where the bootloader is placed by the boot ROM
    pub bootloader_load: Region,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: STATE_PATH,
            state_capacity: STATE_CAPACITY,
            factory: Image {
                kind: ImageKind::Factory,
                path: FACTORY_IMAGE_PATH,
                destination: IMAGE_BASE_ADDRESS,
            },
            custom: Image {
                kind: ImageKind::Custom,
                path: CUSTOM_IMAGE_PATH,
                destination: IMAGE_BASE_ADDRESS,
            },
            execution: Region::new(IMAGE_BASE_ADDRESS, SRAM_ORIGIN + SRAM_SIZE - IMAGE_BASE_ADDRESS),
            bootloader: Region::new(SRAM_ORIGIN, BOOTLOADER_SIZE),
            bootloader_load: Region::new(IMAGE_BASE_ADDRESS, BOOTLOADER_SIZE),
        }
    }
}

/// Reasons a [`Config`] is rejected
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ConfigError {
    RegionSizeZero(Region),
    Misaligned(Address),
    /// The image would not be loaded into the execution region
    ImageOutsideExecution(ImageKind),
    /// The relocated bootloader would be overwritten by loaded images
    BootloaderOverlapsExecution,
    /// The bootloader would overwrite itself while relocating
    BootloaderOverlapsLoad,
    /// The loaded bootloader does not fit its permanent residence
    BootloaderTooLarge,
    StateCapacityTooSmall,
}

impl Config {
    /// Descriptor of the given slot, `None` for unknown kinds
    pub fn image(&self, kind: ImageKind) -> Option<Image> {
        match kind {
            ImageKind::Factory => Some(self.factory),
            ImageKind::Custom => Some(self.custom),
            ImageKind::Unknown(_) => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for region in [self.execution, self.bootloader, self.bootloader_load] {
            if region.size == 0 {
                return Err(ConfigError::RegionSizeZero(region));
            }
            if !region.is_word_aligned() {
                return Err(ConfigError::Misaligned(region.location));
            }
        }

        for image in [self.factory, self.custom] {
            if image.destination % WORD != 0 {
                return Err(ConfigError::Misaligned(image.destination));
            }
            if !self.execution.contains(image.destination) {
                return Err(ConfigError::ImageOutsideExecution(image.kind));
            }
        }

        if self.bootloader.overlaps(&self.execution) {
            return Err(ConfigError::BootloaderOverlapsExecution);
        }
        if self.bootloader.overlaps(&self.bootloader_load) {
            return Err(ConfigError::BootloaderOverlapsLoad);
        }
        if self.bootloader_load.size > self.bootloader.size {
            return Err(ConfigError::BootloaderTooLarge);
        }
        if (self.state_capacity as usize) < crate::state::RECORD_SIZE {
            return Err(ConfigError::StateCapacityTooSmall);
        }

        Ok(())
    }
}
