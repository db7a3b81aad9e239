use void::Void;

use crate::{
    hardware::{processor::Processor, Config, ConfigError},
    log,
    state::{
        file::{ConfigFile, StateError},
        BootRecord, ImageKind, Status,
    },
    storage::FileSystem,
    Context,
};

#[cfg(feature = "use-defmt")]
use defmt::Format;

type FsError<CONTEXT> = <<CONTEXT as Context>::FileSystem as FileSystem>::Error;

#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum MarkError<E> {
    /// An update was requested, but the bootloader has not tried it yet
    UpdateQueuedButNotInstalled,
    /// The record holds a status the running firmware cannot confirm
    InvalidState(Status),
    State(StateError<E>),
}

/// Instantiate this in your firmware to confirm a boot or to request trying the custom image. The
/// bootloader only ever rolls back; moving from Checking to Ok is the job of the firmware.
pub struct OtaManager<CONTEXT: Context> {
    state: ConfigFile,
    file_system: CONTEXT::FileSystem,
    processor: CONTEXT::Processor,
}

impl<CONTEXT: Context> OtaManager<CONTEXT> {
    pub fn new(
        config: &Config,
        file_system: CONTEXT::FileSystem,
        processor: CONTEXT::Processor,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            state: ConfigFile::from_config(config),
            file_system,
            processor,
        })
    }

    /// Destroy this instance of the boot manager and return access to the hardware peripheral
    pub fn destroy(self) -> (CONTEXT::FileSystem, CONTEXT::Processor) {
        (self.file_system, self.processor)
    }

    pub fn read_state(&mut self) -> Result<BootRecord, StateError<FsError<CONTEXT>>> {
        self.state.read(&mut self.file_system)
    }

    /// Run this once the custom image has verified it works. If you do not do this, any reset
    /// will cause the bootloader to go back to the factory image.
    pub fn mark_boot_successful(&mut self) -> Result<(), MarkError<FsError<CONTEXT>>> {
        let current = self.read_state().map_err(MarkError::State)?;

        log::info!(
            "Application running, marking boot as successful. Current state: {:?}",
            current
        );

        let new = match current.status {
            Status::Ok => {
                log::info!("No update was done.");
                return Ok(());
            }
            Status::Checking => {
                log::info!("Custom image was tried, marking as successful.");
                BootRecord::new(Status::Ok, ImageKind::Custom)
            }
            Status::Check => {
                log::error!(
                    "There is an update queued, but it has not been tried yet. Did you skip the bootloader?"
                );
                return Err(MarkError::UpdateQueuedButNotInstalled);
            }
            status => {
                log::error!("Cannot confirm boot in state {:?}", status);
                return Err(MarkError::InvalidState(status));
            }
        };

        log::trace!("New state: {:?}", new);

        self.state
            .write(&mut self.file_system, &new)
            .map_err(MarkError::State)
    }

    /// Report that the running image is broken. The next boot goes back to the factory image.
    pub fn mark_boot_failed(&mut self) -> Result<(), StateError<FsError<CONTEXT>>> {
        let mut record = self.read_state()?;
        log::warn!("Marking {:?} image as failed", record.image);

        record.status = Status::Error;
        self.state.write(&mut self.file_system, &record)
    }

    /// Request the custom image to be tried on the next boot and reset into the bootloader.
    /// Can only return an error or diverge.
    pub fn request_update(&mut self) -> Result<Void, StateError<FsError<CONTEXT>>> {
        log::info!("Update to custom image requested");

        match self.read_state() {
            Ok(current) if current.status != Status::Ok => {
                log::warn!(
                    "There is already an update in progress or queued: {:?}",
                    current
                );
            }
            Ok(_) | Err(StateError::NotFound) => {}
            Err(err) => return Err(err),
        }

        self.state.write(
            &mut self.file_system,
            &BootRecord::new(Status::Check, ImageKind::Custom),
        )?;

        log::info!("Stored update request, resetting into the bootloader!");

        self.processor.reset()
    }
}
