use embedded_storage::Storage;

use crate::{
    hardware::{Config, Image},
    log,
    state::ImageKind,
    storage::{FileSystem, OpenMode},
};

#[cfg(feature = "use-defmt")]
use defmt::Format;

/// Failure while loading an image
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum LoadError<STORAGE, MEMORY> {
    /// The requested kind has no image slot
    NotFound,
    /// Opening or reading the image file failed
    Storage(STORAGE),
    /// The execution region refused the image data
    Memory(MEMORY),
}

/// Copies firmware images from the filesystem into the execution region.
///
/// Nothing about the image is checked: whatever the file contains ends up in memory and will be
/// executed.
pub struct ImageLoader<MEMORY: Storage, const CHUNK_SIZE: usize> {
    config: Config,
    memory: MEMORY,
}

impl<MEMORY: Storage, const CHUNK_SIZE: usize> ImageLoader<MEMORY, CHUNK_SIZE> {
    /// `memory` has to cover `config.execution`, with offset 0 at its start.
    pub fn new(config: &Config, memory: MEMORY) -> Self {
        Self {
            config: *config,
            memory,
        }
    }

    /// Return access to the execution memory
    pub fn destroy(self) -> MEMORY {
        self.memory
    }

    /// Load the image of the given kind to its destination, overwriting what was there. Returns
    /// the number of bytes loaded.
    pub fn load<FS: FileSystem>(
        &mut self,
        fs: &mut FS,
        kind: ImageKind,
    ) -> Result<u32, LoadError<FS::Error, MEMORY::Error>> {
        let image = self.config.image(kind).ok_or(LoadError::NotFound)?;

        log::info!(
            "Loading {:?} image {} to 0x{:x}",
            kind,
            image.path,
            image.destination
        );

        let mut handle = fs
            .open(image.path, OpenMode::Read)
            .map_err(LoadError::Storage)?;
        let result = self.copy(fs, &mut handle, &image);
        fs.close(handle);

        let loaded = result?;
        log::info!("Loaded {} bytes", loaded);
        Ok(loaded)
    }

    fn copy<FS: FileSystem>(
        &mut self,
        fs: &mut FS,
        handle: &mut FS::Handle,
        image: &Image,
    ) -> Result<u32, LoadError<FS::Error, MEMORY::Error>> {
        let length = fs.info(image.path).map_err(LoadError::Storage)?.length;
        let base = image.destination - self.config.execution.location;

        let mut buf = [0_u8; CHUNK_SIZE];
        let mut offset = 0;
        while offset < length {
            let wanted = CHUNK_SIZE.min((length - offset) as usize);
            let read = fs
                .read(handle, offset, &mut buf[..wanted])
                .map_err(LoadError::Storage)?;
            if read == 0 {
                log::warn!(
                    "{} ended after {} of {} bytes",
                    image.path,
                    offset,
                    length
                );
                break;
            }
            log::trace!("Copy {} bytes at offset {}", read, offset);
            self.memory
                .write(base + offset, &buf[..read])
                .map_err(LoadError::Memory)?;
            offset += read as u32;
        }

        Ok(offset)
    }
}
