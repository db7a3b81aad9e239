use crate::{
    hardware::processor::Processor,
    hardware::{Config, ConfigError},
    image::{ImageLoader, LoadError},
    log,
    state::{file::ConfigFile, file::StateError, BootRecord, ImageKind, Status},
    storage::FileSystem,
    Context,
};

#[cfg(feature = "use-defmt")]
use defmt::Format;

type FsError<CONTEXT> = <<CONTEXT as Context>::FileSystem as FileSystem>::Error;
type MemoryError<CONTEXT> = <<CONTEXT as Context>::Memory as embedded_storage::ReadStorage>::Error;
/// [`BootError`] for the collaborators of a given context
pub type ContextError<CONTEXT> = BootError<FsError<CONTEXT>, MemoryError<CONTEXT>>;

/// Reasons a boot attempt ends in a reset
pub enum BootError<STORAGE, MEMORY> {
    /// The boot record could not be created, read or updated
    State(StateError<STORAGE>),
    /// The selected image could not be loaded
    Load(LoadError<STORAGE, MEMORY>),
    /// The stored record was not recognized and has been deleted
    Discarded(BootRecord),
}

impl<STORAGE, MEMORY> core::fmt::Debug for BootError<STORAGE, MEMORY>
where
    STORAGE: core::fmt::Debug,
    MEMORY: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::State(arg0) => f.debug_tuple("State").field(arg0).finish(),
            Self::Load(arg0) => f.debug_tuple("Load").field(arg0).finish(),
            Self::Discarded(arg0) => f.debug_tuple("Discarded").field(arg0).finish(),
        }
    }
}

// Collaborator errors are not required to implement Format, only the variant is logged
#[cfg(feature = "use-defmt")]
impl<STORAGE, MEMORY> Format for BootError<STORAGE, MEMORY> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::State(_) => defmt::write!(f, "State"),
            Self::Load(_) => defmt::write!(f, "Load"),
            Self::Discarded(record) => defmt::write!(f, "Discarded({})", record),
        }
    }
}

/// Outcome of evaluating a stored record
#[cfg_attr(feature = "use-defmt", derive(Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Transition {
    /// Boot `image`. If `persist` is set, `record` has to be stored before the image is loaded.
    Boot {
        record: BootRecord,
        persist: bool,
        image: ImageKind,
    },
    /// The record is corrupted: delete it and reset
    Discard(BootRecord),
}

/// Use this from your bootloader application and call boot() to do the magic, reading the current
/// record from the config file, loading the selected image and jumping to it
pub struct OtaBoot<CONTEXT: Context, const CHUNK_SIZE: usize> {
    config: Config,
    state: ConfigFile,
    file_system: CONTEXT::FileSystem,
    loader: ImageLoader<CONTEXT::Memory, CHUNK_SIZE>,
    processor: CONTEXT::Processor,
}

impl<CONTEXT: Context, const CHUNK_SIZE: usize> OtaBoot<CONTEXT, CHUNK_SIZE> {
    /// create a new instance of the bootloader. `memory` has to cover `config.execution`.
    pub fn new(
        config: Config,
        file_system: CONTEXT::FileSystem,
        memory: CONTEXT::Memory,
        processor: CONTEXT::Processor,
    ) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            log::error!("Invalid bootloader configuration: {:?}", err);
            return Err(err);
        }

        Ok(Self {
            state: ConfigFile::from_config(&config),
            loader: ImageLoader::new(&config, memory),
            config,
            file_system,
            processor,
        })
    }

    /// Destroy this instance of the bootloader and return access to the hardware peripheral
    pub fn destroy(self) -> (CONTEXT::FileSystem, CONTEXT::Memory, CONTEXT::Processor) {
        (self.file_system, self.loader.destroy(), self.processor)
    }

    /// Execute the boot logic of the bootloader. Ends either in the selected image or in a reset.
    pub fn boot(&mut self) -> ! {
        log::info!("Booting with otaboot!");

        self.processor.setup(&self.config);

        match self.select() {
            Ok(image) => self.jump_to_firmware(image),
            Err(err) => {
                log::error!("Boot failed: {:?}, resetting", err);
                self.processor.reset()
            }
        }
    }

    /// Run one decision cycle up to, but not including, the jump: bring the record up to date and
    /// load the selected image. Returns the kind of the loaded image.
    pub fn select(&mut self) -> Result<ImageKind, ContextError<CONTEXT>> {
        let record = self.prepare()?;

        log::info!("Boot record: {:?}", record);

        match Self::transition(record) {
            Transition::Boot {
                record: new,
                persist,
                image,
            } => {
                if persist {
                    log::info!("New boot record: {:?}", new);
                    self.state
                        .write(&mut self.file_system, &new)
                        .map_err(BootError::State)?;
                }

                self.loader
                    .load(&mut self.file_system, image)
                    .map_err(BootError::Load)?;

                Ok(image)
            }
            Transition::Discard(record) => {
                log::error!("Unusable boot record {:?}, discarding it", record);
                // Nothing left to try if this fails, the reset follows either way
                let _ = self.state.delete(&mut self.file_system);
                Err(BootError::Discarded(record))
            }
        }
    }

    /// Make sure a boot record exists and read it.
    pub fn prepare(&mut self) -> Result<BootRecord, ContextError<CONTEXT>> {
        if !self.state.exists(&mut self.file_system) {
            log::info!("{} not found, creating new", self.state.path());
            self.state
                .write(&mut self.file_system, &BootRecord::default())
                .map_err(BootError::State)?;
        }

        log::info!("Loading boot record");
        self.state
            .read(&mut self.file_system)
            .map_err(BootError::State)
    }

    /// Decide what to do with the stored record.
    pub fn transition(record: BootRecord) -> Transition {
        match record.status {
            Status::Ok => Self::handle_ok(record),
            Status::Check => Self::handle_check(record),
            Status::Checking => Self::handle_checking(record),
            Status::Error => Self::handle_error(record),
            Status::Unknown(_) => Transition::Discard(record),
        }
    }

    // Last boot went fine, boot the same image again without touching the record. A slot that
    // does not exist can never load, so the record is dropped and the next boot starts over.
    fn handle_ok(record: BootRecord) -> Transition {
        if let ImageKind::Unknown(_) = record.image {
            return Transition::Discard(record);
        }
        log::info!("Nothing to do, booting {:?} image", record.image);
        Transition::Boot {
            record,
            persist: false,
            image: record.image,
        }
    }

    // A new custom image is waiting. Mark the attempt before trying it: if the image never
    // confirms itself, the next boot finds Checking and rolls back.
    fn handle_check(record: BootRecord) -> Transition {
        log::info!("New firmware available, trying custom image");
        Transition::Boot {
            record: BootRecord::new(Status::Checking, record.image),
            persist: true,
            image: ImageKind::Custom,
        }
    }

    // The previous attempt reset before the custom image confirmed itself
    fn handle_checking(record: BootRecord) -> Transition {
        log::warn!(
            "Custom image did not confirm itself, something went wrong after the update!"
        );
        Self::roll_back(record)
    }

    // The custom image reported an error
    fn handle_error(record: BootRecord) -> Transition {
        log::warn!("Custom image reported an error");
        Self::roll_back(record)
    }

    fn roll_back(record: BootRecord) -> Transition {
        log::info!("Reverting from {:?} to factory image", record.image);
        Transition::Boot {
            record: BootRecord::default(),
            persist: true,
            image: ImageKind::Factory,
        }
    }

    // Jump to the loaded firmware image
    fn jump_to_firmware(&mut self, image: ImageKind) -> ! {
        let address = self.config.execution.location;
        log::info!("Running {:?} image at 0x{:x}", image, address);

        self.file_system.release();

        self.processor.do_jump(address)
    }
}
