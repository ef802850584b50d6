use crate::sys::{status, InstantiateError};
use thiserror::Error;

/// Error produced by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Caller input rejected before any foreign memory was touched.
    #[error("{0}")]
    InvalidInput(String),
    /// The codec returned a nonzero status; `message` is its diagnostic.
    #[error("{message}")]
    Native { code: i32, message: String },
    /// Linear memory could not satisfy an allocation made by the bridge.
    #[error("foreign heap exhausted allocating {requested} bytes")]
    OutOfMemory { requested: usize },
    /// The codec reported a result that does not fit in linear memory.
    #[error("{len} bytes at address {addr:#x} lie outside linear memory")]
    OutOfBounds { addr: u32, len: usize },
    /// A blocking call was made before the module finished initializing.
    #[error("codec module is not initialized yet")]
    NotReady,
    /// A module has already been installed into this runtime.
    #[error("codec module is already installed")]
    AlreadyInstalled,
    #[error("cannot instantiate codec module: {0}")]
    Instantiate(#[from] InstantiateError),
    #[error("cannot start module initialization: {0}")]
    Spawn(String),
    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn native(code: i32, message: String) -> Self {
        let message = if message.is_empty() {
            format!("native call failed with status {code} ({})", status::name(code))
        } else {
            message
        };
        Self::Native { code, message }
    }

    /// Native status code, when the error came out of the codec.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}
