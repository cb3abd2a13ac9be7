use super::{check_slot, NvmHandle};
use crate::error::{constants, ProtocolError, Result};

/// 8-bit counter in one NVM slot, wrapping 255 → 0.
#[derive(Clone)]
pub struct Counter {
    store: NvmHandle,
    index: usize,
}

impl Counter {
    /// Bind a counter to slot `index`; fails if the slot is outside the store.
    pub fn new(store: NvmHandle, index: usize) -> Result<Self> {
        check_slot(&store, index)?;
        Ok(Self { store, index })
    }

    pub fn get(&self) -> Result<u8> {
        self.store.borrow().read(self.index)
    }

    pub fn increment(&self) -> Result<()> {
        let next = self.get()?.wrapping_add(1);
        self.store.borrow_mut().write(self.index, next)
    }

    /// Increment and return the new value.
    pub fn next(&self) -> Result<u8> {
        self.increment()?;
        self.get()
    }

    pub fn name(&self) -> String {
        format!("Counter_index_{}", self.index)
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("index", &self.index).finish()
    }
}

/// 16-bit counter over two consecutive slots (high byte first).
#[derive(Clone)]
pub struct Counter16 {
    store: NvmHandle,
    index: usize,
}

impl Counter16 {
    pub fn new(store: NvmHandle, index: usize) -> Result<Self> {
        let low = index
            .checked_add(1)
            .ok_or_else(|| ProtocolError::Storage(constants::ERR_SLOT_OUT_OF_RANGE.to_string()))?;
        check_slot(&store, index)?;
        check_slot(&store, low)?;
        Ok(Self { store, index })
    }

    pub fn get(&self) -> Result<u16> {
        let store = self.store.borrow();
        let high = store.read(self.index)?;
        let low = store.read(self.index + 1)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    pub fn set(&self, value: u16) -> Result<()> {
        let [high, low] = value.to_be_bytes();
        let mut store = self.store.borrow_mut();
        store.write(self.index, high)?;
        store.write(self.index + 1, low)
    }

    pub fn increment(&self) -> Result<()> {
        self.set(self.get()?.wrapping_add(1))
    }

    pub fn name(&self) -> String {
        format!("Counter16_index_{}", self.index)
    }
}

impl std::fmt::Debug for Counter16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter16").field("index", &self.index).finish()
    }
}
