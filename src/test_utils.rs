//! In-memory collaborators for host tests.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use embedded_storage::{ReadStorage, Storage};

use crate::{
    hardware::{processor::Processor, Config},
    storage::{FileInfo, FileSystem, OpenMode},
    Address, Context,
};

/// Every call made against [`MemoryFileSystem`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Info(String),
    Create(String, u32),
    OpenRead(String),
    OpenWrite(String),
    Read(String),
    Write(String),
    Close(String),
    Delete(String),
    Release,
}

/// Call that should fail on [`MemoryFileSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Info,
    Open(&'static str),
    Read(&'static str),
    Write,
    /// Writes succeed but only store half of the buffer
    ShortWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    ReadOnly,
    CapacityExceeded,
    Injected,
}

#[derive(Debug)]
pub struct TestFile {
    pub data: Vec<u8>,
    pub capacity: Option<u32>,
}

#[derive(Debug)]
pub struct TestHandle {
    path: String,
    writable: bool,
}

#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    pub files: BTreeMap<String, TestFile>,
    pub ops: Vec<Op>,
    pub faults: Vec<Fault>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(
            path.to_string(),
            TestFile {
                data: data.to_vec(),
                capacity: None,
            },
        );
        self
    }

    pub fn fail(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn data(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|file| file.data.as_slice())
    }

    /// Position of the first recorded operation equal to `op`.
    pub fn position(&self, op: &Op) -> Option<usize> {
        self.ops.iter().position(|recorded| recorded == op)
    }

    fn faulty(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

impl FileSystem for MemoryFileSystem {
    type Handle = TestHandle;
    type Error = FsError;

    fn info(&mut self, path: &str) -> Result<FileInfo, FsError> {
        self.ops.push(Op::Info(path.to_string()));
        if self.faulty(Fault::Info) {
            return Err(FsError::Injected);
        }
        self.files
            .get(path)
            .map(|file| FileInfo {
                length: file.data.len() as u32,
            })
            .ok_or(FsError::NotFound)
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<TestHandle, FsError> {
        let path = path.to_string();
        match mode {
            OpenMode::Create { capacity, .. } => {
                self.ops.push(Op::Create(path.clone(), capacity));
                if self.files.contains_key(&path) {
                    return Err(FsError::AlreadyExists);
                }
                self.files.insert(
                    path.clone(),
                    TestFile {
                        data: Vec::new(),
                        capacity: Some(capacity),
                    },
                );
                Ok(TestHandle {
                    path,
                    writable: true,
                })
            }
            OpenMode::Read | OpenMode::Write => {
                let writable = mode == OpenMode::Write;
                self.ops.push(if writable {
                    Op::OpenWrite(path.clone())
                } else {
                    Op::OpenRead(path.clone())
                });
                if self
                    .faults
                    .iter()
                    .any(|fault| matches!(fault, Fault::Open(p) if *p == path))
                {
                    return Err(FsError::Injected);
                }
                if !self.files.contains_key(&path) {
                    return Err(FsError::NotFound);
                }
                Ok(TestHandle { path, writable })
            }
        }
    }

    fn read(
        &mut self,
        handle: &mut TestHandle,
        offset: u32,
        buffer: &mut [u8],
    ) -> Result<usize, FsError> {
        self.ops.push(Op::Read(handle.path.clone()));
        if self
            .faults
            .iter()
            .any(|fault| matches!(fault, Fault::Read(p) if *p == handle.path))
        {
            return Err(FsError::Injected);
        }
        let file = self.files.get(&handle.path).ok_or(FsError::NotFound)?;
        let start = (offset as usize).min(file.data.len());
        let end = (start + buffer.len()).min(file.data.len());
        buffer[..end - start].copy_from_slice(&file.data[start..end]);
        Ok(end - start)
    }

    fn write(
        &mut self,
        handle: &mut TestHandle,
        offset: u32,
        buffer: &[u8],
    ) -> Result<usize, FsError> {
        self.ops.push(Op::Write(handle.path.clone()));
        if self.faulty(Fault::Write) {
            return Err(FsError::Injected);
        }
        if !handle.writable {
            return Err(FsError::ReadOnly);
        }
        let buffer = if self.faulty(Fault::ShortWrite) {
            &buffer[..buffer.len() / 2]
        } else {
            buffer
        };
        let file = self.files.get_mut(&handle.path).ok_or(FsError::NotFound)?;
        let end = offset as usize + buffer.len();
        if let Some(capacity) = file.capacity {
            if end > capacity as usize {
                return Err(FsError::CapacityExceeded);
            }
        }
        if file.data.len() < end {
            file.data.resize(end, 0);
        }
        file.data[offset as usize..end].copy_from_slice(buffer);
        Ok(buffer.len())
    }

    fn close(&mut self, handle: TestHandle) {
        self.ops.push(Op::Close(handle.path));
    }

    fn delete(&mut self, path: &str) -> Result<(), FsError> {
        self.ops.push(Op::Delete(path.to_string()));
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or(FsError::NotFound)
    }

    fn release(&mut self) {
        self.ops.push(Op::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds;

/// Execution region backed by a vector, addressed relative to its start.
#[derive(Debug)]
pub struct TestMemory {
    pub bytes: Vec<u8>,
}

impl TestMemory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: std::vec![0xff; size],
        }
    }
}

impl ReadStorage for TestMemory {
    type Error = OutOfBounds;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), OutOfBounds> {
        let start = offset as usize;
        let source = self
            .bytes
            .get(start..start + bytes.len())
            .ok_or(OutOfBounds)?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for TestMemory {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), OutOfBounds> {
        let start = offset as usize;
        self.bytes
            .get_mut(start..start + bytes.len())
            .ok_or(OutOfBounds)?
            .copy_from_slice(bytes);
        Ok(())
    }
}

/// How a simulated run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Jump(Address),
    Reset,
}

/// Processor that ends the simulated run instead of jumping or resetting.
#[derive(Debug, Default)]
pub struct TestProcessor {
    pub setup_calls: usize,
}

impl Processor for TestProcessor {
    fn do_jump(&mut self, address: Address) -> ! {
        std::panic::panic_any(Halt::Jump(address))
    }

    fn reset(&mut self) -> ! {
        std::panic::panic_any(Halt::Reset)
    }

    fn setup(&mut self, _config: &Config) {
        self.setup_calls += 1;
    }
}

/// Run `f` until the processor halts it.
pub fn run_to_halt<F: FnOnce()>(f: F) -> Halt {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("run returned without halting"),
        Err(payload) => match payload.downcast::<Halt>() {
            Ok(halt) => *halt,
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

pub struct TestContext;

impl Context for TestContext {
    type FileSystem = MemoryFileSystem;
    type Memory = TestMemory;
    type Processor = TestProcessor;
}

pub const TEST_EXECUTION_BASE: Address = 0x2000_4000;
pub const TEST_EXECUTION_SIZE: Address = 0x400;

/// Small layout so the execution region fits comfortably in a test vector.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.execution.size = TEST_EXECUTION_SIZE;
    config
}

/// Image whose vector table points into the execution region, followed by `body`.
pub fn image_bytes(entry: u32, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x2003_fff0_u32.to_ne_bytes());
    bytes.extend_from_slice(&entry.to_ne_bytes());
    bytes.extend_from_slice(body);
    bytes
}
