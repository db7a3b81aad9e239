pub mod file;

#[cfg(feature = "use-defmt")]
use defmt::Format;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Decision making states for the bootloader
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Status {
    /// Last boot went fine, boot the recorded image again
    Ok,
    /// A new custom image was installed and has to be tried
    Check,
    /// The custom image is being tried. If the bootloader sees this, the image never confirmed
    /// itself and gets rolled back.
    Checking,
    /// The custom image reported a failure, go back to the factory image
    Error,
    /// Any other stored value, most likely a corrupted record
    Unknown(u32),
}

impl Status {
    pub const fn code(self) -> u32 {
        match self {
            Status::Ok => 0,
            Status::Check => 1,
            Status::Checking => 2,
            Status::Error => 3,
            Status::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Status::Ok,
            1 => Status::Check,
            2 => Status::Checking,
            3 => Status::Error,
            code => Status::Unknown(code),
        }
    }
}

/// Which of the two firmware slots an operation refers to
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ImageKind {
    Factory,
    Custom,
    /// Stored value outside the known slots. Kept so the loader can refuse it.
    Unknown(u32),
}

impl ImageKind {
    pub const fn code(self) -> u32 {
        match self {
            ImageKind::Factory => 0,
            ImageKind::Custom => 1,
            ImageKind::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => ImageKind::Factory,
            1 => ImageKind::Custom,
            code => ImageKind::Unknown(code),
        }
    }
}

/// Size of the persisted record
pub const RECORD_SIZE: usize = 2 * core::mem::size_of::<u32>();

/// Record stored in the config file, read and possibly rewritten once per boot.
///
/// The persisted form is the two codes as native endian words, status first. Reader and writer
/// are always the same build, so there is no version tag.
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[cfg_attr(feature = "derive", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct BootRecord {
    pub status: Status,
    pub image: ImageKind,
}

impl Default for BootRecord {
    /// Record written on first boot: boot the factory image.
    fn default() -> Self {
        Self {
            status: Status::Ok,
            image: ImageKind::Factory,
        }
    }
}

impl BootRecord {
    pub const fn new(status: Status, image: ImageKind) -> Self {
        Self { status, image }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0_u8; RECORD_SIZE];
        bytes[..4].copy_from_slice(&self.status.code().to_ne_bytes());
        bytes[4..].copy_from_slice(&self.image.code().to_ne_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let [s0, s1, s2, s3, i0, i1, i2, i3] = *bytes;
        Self {
            status: Status::from_code(u32::from_ne_bytes([s0, s1, s2, s3])),
            image: ImageKind::from_code(u32::from_ne_bytes([i0, i1, i2, i3])),
        }
    }
}
