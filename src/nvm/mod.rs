//! # Persistent State
//!
//! Counters and flags that survive resets, stored in an arena of byte slots.
//!
//! The store is injected rather than global: callers build one [`NvmStore`]
//! and hand [`NvmHandle`] clones to each [`Counter`] / [`Flag`], which address
//! it by slot index (see [`slots`] for the flight layout).
//!
//! ## Stores
//! - [`MemoryStore`]: plain RAM, for tests and ground tooling
//! - [`FileStore`]: a file mirrored in RAM, rewritten on each update
//!
//! Construction fails if a slot lies outside the store; the stack cannot run
//! without its message counter, so this is the one error surfaced to callers.

use crate::error::{constants, ProtocolError, Result};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error};

mod counter;
mod flag;

pub use counter::{Counter, Counter16};
pub use flag::Flag;

/// Slot assignments of the flight NVM layout.
pub mod slots {
    /// Size of the NVM arena in bytes.
    pub const NVM_SIZE: usize = 32;

    /// Packet manager message id.
    pub const MESSAGE_COUNTER: usize = 0;
    /// Boot count.
    pub const BOOT_COUNTER: usize = 1;
    /// Two-byte (high, low) count of executed commands.
    pub const COMMAND_COUNTER: usize = 2;

    /// Byte holding the mission flags.
    pub const FLAGS_BYTE: usize = 16;
    /// Set by the `reset` command; the main loop restarts and clears it.
    pub const RESET_FLAG_BIT: u8 = 0;
    /// Antennas deployed.
    pub const DEPLOYED_FLAG_BIT: u8 = 1;
}

/// Byte-addressed persistent storage.
pub trait NvmStore {
    /// Number of byte slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, index: usize) -> Result<u8>;

    fn write(&mut self, index: usize, value: u8) -> Result<()>;
}

/// Shared handle to a store. Single-threaded by construction.
pub type NvmHandle = Rc<RefCell<dyn NvmStore>>;

fn check_slot(store: &NvmHandle, index: usize) -> Result<()> {
    let len = store.borrow().len();
    if index >= len {
        return Err(ProtocolError::Storage(format!(
            "{}: {index} >= {len}",
            constants::ERR_SLOT_OUT_OF_RANGE
        )));
    }
    Ok(())
}

/// RAM-backed store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    /// Wrap the store in a shareable handle.
    pub fn handle(len: usize) -> NvmHandle {
        Rc::new(RefCell::new(Self::new(len)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl NvmStore for MemoryStore {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or_else(|| ProtocolError::Storage(constants::ERR_SLOT_OUT_OF_RANGE.to_string()))
    }

    fn write(&mut self, index: usize, value: u8) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(index)
            .ok_or_else(|| ProtocolError::Storage(constants::ERR_SLOT_OUT_OF_RANGE.to_string()))?;
        *slot = value;
        Ok(())
    }
}

/// File-backed store: the whole arena is rewritten on every update.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileStore {
    /// Open `path`, creating a zeroed arena of `len` bytes if it does not exist.
    ///
    /// A file of the wrong size is padded or truncated to `len`.
    pub fn open<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                error!(error = %e, path = %path.display(), "NVM backing file unreadable");
                return Err(ProtocolError::Storage(format!("Failed to read NVM file: {e}")));
            }
        };
        bytes.resize(len, 0);
        fs::write(&path, &bytes)
            .map_err(|e| ProtocolError::Storage(format!("Failed to write NVM file: {e}")))?;
        debug!(path = %path.display(), len, "NVM store opened");
        Ok(Self { path, bytes })
    }

    pub fn handle<P: AsRef<Path>>(path: P, len: usize) -> Result<NvmHandle> {
        Ok(Rc::new(RefCell::new(Self::open(path, len)?)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NvmStore for FileStore {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or_else(|| ProtocolError::Storage(constants::ERR_SLOT_OUT_OF_RANGE.to_string()))
    }

    fn write(&mut self, index: usize, value: u8) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(index)
            .ok_or_else(|| ProtocolError::Storage(constants::ERR_SLOT_OUT_OF_RANGE.to_string()))?;
        let previous = *slot;
        *slot = value;
        if let Err(e) = fs::write(&self.path, &self.bytes) {
            self.bytes[index] = previous;
            return Err(ProtocolError::Storage(format!("Failed to write NVM file: {e}")));
        }
        Ok(())
    }
}
