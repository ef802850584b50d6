use crate::memory::{NULL_GUARD, PAGE_SIZE};
use std::error::Error as StdError;
use std::fmt;

/// Layout parameters for a freshly instantiated [`Module`](crate::Module).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Bytes of linear memory committed at instantiation. Must be a multiple of [`PAGE_SIZE`].
    pub initial_memory: u32,
    /// Upper bound the heap may grow to. Must be a multiple of [`PAGE_SIZE`].
    pub maximum_memory: u32,
    /// Bytes reserved for the scratch stack, carved out right after the null guard.
    pub stack_size: u32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            initial_memory: 16 * PAGE_SIZE,
            maximum_memory: 4096 * PAGE_SIZE,
            stack_size: PAGE_SIZE,
        }
    }
}

impl ModuleConfig {
    pub fn validate(&self) -> Result<(), InstantiateError> {
        if self.initial_memory % PAGE_SIZE != 0 {
            return Err(InstantiateError::Unaligned {
                field: "initial_memory",
                value: self.initial_memory,
            });
        }
        if self.maximum_memory % PAGE_SIZE != 0 {
            return Err(InstantiateError::Unaligned {
                field: "maximum_memory",
                value: self.maximum_memory,
            });
        }
        if self.initial_memory > self.maximum_memory {
            return Err(InstantiateError::InitialExceedsMaximum {
                initial: self.initial_memory,
                maximum: self.maximum_memory,
            });
        }
        // the stack plus the null guard has to leave room for at least one heap page.
        let reserved = u64::from(NULL_GUARD) + u64::from(self.stack_size) + u64::from(PAGE_SIZE);
        if reserved > u64::from(self.initial_memory) {
            return Err(InstantiateError::StackTooLarge {
                stack_size: self.stack_size,
                initial: self.initial_memory,
            });
        }
        Ok(())
    }
}

/// Why a [`ModuleConfig`] cannot be turned into a running module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstantiateError {
    Unaligned { field: &'static str, value: u32 },
    InitialExceedsMaximum { initial: u32, maximum: u32 },
    StackTooLarge { stack_size: u32, initial: u32 },
}

impl fmt::Display for InstantiateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unaligned { field, value } => {
                write!(f, "{field} ({value}) is not a multiple of {PAGE_SIZE}")
            }
            Self::InitialExceedsMaximum { initial, maximum } => {
                write!(f, "initial memory {initial} exceeds maximum memory {maximum}")
            }
            Self::StackTooLarge { stack_size, initial } => write!(
                f,
                "stack of {stack_size} bytes leaves no heap page in {initial} bytes of memory"
            ),
        }
    }
}

impl StdError for InstantiateError {}
