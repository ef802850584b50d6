//! Safe bridge to the `jpegasm-sys` codec module.
//!
//! The module only understands integers: addresses into its own linear memory
//! and counts. This crate does the rest:
//! - [`ReadinessGate`] holds every call back until the module is instantiated.
//! - The marshaling layer copies buffers in, zeroes output slots, invokes the
//!   entry point, copies results out and frees every block it touched, on
//!   success and failure alike.
//! - [`Runtime`] serializes calls into the shared heap and offers both
//!   `async` and blocking [`encode`](Runtime::encode)/[`decode`](Runtime::decode).
//!
//! The free functions below go through [`Runtime::global`]:
//!
//! ```no_run
//! # async fn demo() -> jpegasm::Result<()> {
//! let pixels = [0x00, 0x00, 0xFF].repeat(32 * 32);
//! let jpeg = jpegasm::encode(&pixels, &jpegasm::EncodeOptions::new(32, 32).with_quality(80)).await?;
//! let decoded = jpegasm::decode(&jpeg).await?;
//! assert_eq!((decoded.width, decoded.height), (32, 32));
//! # Ok(())
//! # }
//! ```

/// The raw module. Most users should favor the safe wrappers re-exported from this crate.
pub use jpegasm_sys as sys;

mod api;
pub mod config;
mod error;
mod frame;
mod gate;
mod marshal;
mod runtime;

pub use api::{DecodedImage, EncodeOptions, CHANNELS, DEFAULT_QUALITY};
pub use error::{Error, Result};
pub use gate::ReadinessGate;
pub use runtime::Runtime;

/// [`Runtime::encode`] on the process-wide runtime.
pub async fn encode(pixels: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
    Runtime::global().encode(pixels, options).await
}

/// [`Runtime::decode`] on the process-wide runtime.
pub async fn decode(jpeg: &[u8]) -> Result<DecodedImage> {
    Runtime::global().decode(jpeg).await
}

/// [`Runtime::encode_blocking`] on the process-wide runtime.
pub fn encode_blocking(pixels: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
    Runtime::global().encode_blocking(pixels, options)
}

/// [`Runtime::decode_blocking`] on the process-wide runtime.
pub fn decode_blocking(jpeg: &[u8]) -> Result<DecodedImage> {
    Runtime::global().decode_blocking(jpeg)
}
