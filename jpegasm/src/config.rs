//! Environment overrides for the module layout.

use crate::error::{Error, Result};
use crate::sys::ModuleConfig;
use std::env;

pub const INITIAL_MEMORY_ENV: &str = "JPEGASM_INITIAL_MEMORY";
pub const MAXIMUM_MEMORY_ENV: &str = "JPEGASM_MAXIMUM_MEMORY";
pub const STACK_SIZE_ENV: &str = "JPEGASM_STACK_SIZE";

/// [`ModuleConfig::default`] with any of the `JPEGASM_*` variables applied.
pub fn module_config_from_env() -> Result<ModuleConfig> {
    module_config_from(|key| env::var(key).ok())
}

fn module_config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<ModuleConfig> {
    let mut config = ModuleConfig::default();
    let fields = [
        (INITIAL_MEMORY_ENV, &mut config.initial_memory),
        (MAXIMUM_MEMORY_ENV, &mut config.maximum_memory),
        (STACK_SIZE_ENV, &mut config.stack_size),
    ];
    for (key, field) in fields {
        if let Some(value) = lookup(key) {
            let parsed = value.trim().parse();
            *field = parsed.map_err(|_| Error::Config { key, value })?;
        }
    }
    config.validate()?;
    Ok(config)
}
