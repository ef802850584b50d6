//! Raw, numeric-only JPEG codec module.
//!
//! A [`Module`] owns one [`LinearMemory`] and exposes two entry points,
//! [`Module::encode_jpeg`] and [`Module::decode_jpeg`], whose every parameter
//! is an integer: addresses into linear memory, dimensions, and output-slot
//! addresses. Nothing here tracks ownership across calls; callers allocate,
//! invoke, read back and free by hand. Most users should favor the safe
//! wrappers in the `jpegasm` crate.

mod codec;
mod config;
mod memory;
pub mod status;

pub use config::{InstantiateError, ModuleConfig};
pub use memory::{HeapStats, LinearMemory, NULL_GUARD, PAGE_SIZE};

use std::fmt;

pub struct Module {
    memory: LinearMemory,
}

impl Module {
    pub fn instantiate(config: ModuleConfig) -> Result<Self, InstantiateError> {
        config.validate()?;
        Ok(Self {
            memory: LinearMemory::new(&config),
        })
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("memory_size", &self.memory.size())
            .field("stats", &self.memory.stats())
            .finish()
    }
}
