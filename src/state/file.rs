use crate::{
    hardware::Config,
    log,
    state::{BootRecord, RECORD_SIZE},
    storage::{Access, FileSystem, OpenMode},
};

#[cfg(feature = "use-defmt")]
use defmt::Format;

/// Failure to access the boot record
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum StateError<E> {
    /// There is no boot record
    NotFound,
    /// The filesystem failed to open, read or write the record
    Storage(E),
    /// Fewer bytes than a full record were transferred
    Short { expected: usize, actual: usize },
}

/// Boot record kept in a single fixed-size file.
///
/// Writes go straight to the file. A power loss in the middle of a write can leave a record mixing
/// old and new bytes, which the bootloader treats like any other stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigFile {
    path: &'static str,
    capacity: u32,
}

impl ConfigFile {
    pub const fn new(path: &'static str, capacity: u32) -> Self {
        Self { path, capacity }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.state_path, config.state_capacity)
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Whether the record file exists.
    ///
    /// A failing lookup is indistinguishable from a missing file here, so a broken filesystem looks
    /// like a first boot to the caller.
    pub fn exists<FS: FileSystem>(&self, fs: &mut FS) -> bool {
        fs.info(self.path).is_ok()
    }

    /// Allocate the record file. Must only be called if the file does not exist yet.
    pub fn create<FS: FileSystem>(&self, fs: &mut FS) -> Result<FS::Handle, FS::Error> {
        log::info!("Creating {} with {} bytes", self.path, self.capacity);
        fs.open(
            self.path,
            OpenMode::Create {
                capacity: self.capacity,
                access: Access::PublicReadWrite,
            },
        )
    }

    pub fn delete<FS: FileSystem>(&self, fs: &mut FS) -> Result<(), FS::Error> {
        log::warn!("Deleting {}", self.path);
        fs.delete(self.path)
    }

    pub fn read<FS: FileSystem>(&self, fs: &mut FS) -> Result<BootRecord, StateError<FS::Error>> {
        if !self.exists(fs) {
            return Err(StateError::NotFound);
        }

        let mut handle = fs
            .open(self.path, OpenMode::Read)
            .map_err(StateError::Storage)?;
        let mut bytes = [0_u8; RECORD_SIZE];
        let read = fs.read(&mut handle, 0, &mut bytes);
        fs.close(handle);

        let read = read.map_err(StateError::Storage)?;
        if read < RECORD_SIZE {
            return Err(StateError::Short {
                expected: RECORD_SIZE,
                actual: read,
            });
        }

        let record = BootRecord::from_bytes(&bytes);
        log::trace!("Read {:?} from {}", record, self.path);
        Ok(record)
    }

    /// Store the full record, creating the file first if needed.
    pub fn write<FS: FileSystem>(
        &self,
        fs: &mut FS,
        record: &BootRecord,
    ) -> Result<(), StateError<FS::Error>> {
        log::trace!("Writing {:?} to {}", record, self.path);

        let mut handle = if self.exists(fs) {
            fs.open(self.path, OpenMode::Write)
        } else {
            self.create(fs)
        }
        .map_err(StateError::Storage)?;

        let bytes = record.to_bytes();
        let written = fs.write(&mut handle, 0, &bytes);
        fs.close(handle);

        let written = written.map_err(StateError::Storage)?;
        if written < RECORD_SIZE {
            return Err(StateError::Short {
                expected: RECORD_SIZE,
                actual: written,
            });
        }

        Ok(())
    }
}
