use super::{check_slot, NvmHandle};
use crate::error::{constants, ProtocolError, Result};

/// One bit of an NVM slot.
#[derive(Clone)]
pub struct Flag {
    store: NvmHandle,
    index: usize,
    bit: u8,
}

impl Flag {
    pub fn new(store: NvmHandle, index: usize, bit: u8) -> Result<Self> {
        if bit >= 8 {
            return Err(ProtocolError::Storage(constants::ERR_BIT_OUT_OF_RANGE.to_string()));
        }
        check_slot(&store, index)?;
        Ok(Self { store, index, bit })
    }

    fn mask(&self) -> u8 {
        1 << self.bit
    }

    pub fn get(&self) -> Result<bool> {
        Ok(self.store.borrow().read(self.index)? & self.mask() != 0)
    }

    /// Set (`true`) or clear (`false`) the bit, leaving its neighbours alone.
    pub fn toggle(&self, value: bool) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let byte = store.read(self.index)?;
        let updated = if value { byte | self.mask() } else { byte & !self.mask() };
        store.write(self.index, updated)
    }

    pub fn name(&self) -> String {
        format!("Flag_index_{}_bit_{}", self.index, self.bit)
    }
}

impl std::fmt::Debug for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flag")
            .field("index", &self.index)
            .field("bit", &self.bit)
            .finish()
    }
}
