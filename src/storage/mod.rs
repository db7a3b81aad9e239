//! Interface to the filesystem on the external serial flash.
//!
//! The bootloader keeps its boot record and both firmware images as files. The driver behind this
//! trait (usually a network co-processor exposing the flash) is provided by the application.

use core::fmt::Debug;

#[cfg(feature = "use-defmt")]
use defmt::Format;

/// Metadata of an existing file.
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct FileInfo {
    /// Length of the file content in bytes
    pub length: u32,
}

/// Who may access a newly created file. Secure files are not supported.
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[non_exhaustive]
pub enum Access {
    PublicReadWrite,
}

#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum OpenMode {
    /// Allocate a new file with a fixed maximum size and open it for writing
    Create { capacity: u32, access: Access },
    /// Open an existing file for reading
    Read,
    /// Open an existing file for writing, starting over at offset 0
    Write,
}

/// Blocking file access. Every call completes (or fails) before returning, there are no timeouts.
pub trait FileSystem {
    type Handle;
    type Error: Debug;

    /// Look up the metadata of `path`. Fails if the file does not exist.
    fn info(&mut self, path: &str) -> Result<FileInfo, Self::Error>;
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::Handle, Self::Error>;
    /// Read into `buffer` starting at `offset`, returning the number of bytes read.
    fn read(
        &mut self,
        handle: &mut Self::Handle,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error>;
    /// Write `buffer` at `offset`, returning the number of bytes written.
    fn write(
        &mut self,
        handle: &mut Self::Handle,
        offset: u32,
        buffer: &[u8],
    ) -> Result<usize, Self::Error>;
    fn close(&mut self, handle: Self::Handle);
    fn delete(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Called once right before control is handed to the loaded image, e.g. to stop the storage
    /// co-processor.
    fn release(&mut self) {}
}
