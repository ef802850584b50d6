use crate::error::{Error, Result};
use crate::marshal;
use crate::runtime::Runtime;
use tracing::debug;

/// Quality used when [`EncodeOptions::quality`] is left unset.
pub const DEFAULT_QUALITY: i32 = 90;

/// Bytes per pixel of every buffer crossing the bridge (packed R, G, B).
pub const CHANNELS: usize = 3;

/// Parameters for [`Runtime::encode`].
///
/// Width and height are required; they are optional here only so that a
/// missing value surfaces as [`Error::InvalidInput`] instead of a panic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// JPEG quality in `[0, 100]`; the codec clamps anything outside `[1, 100]`.
    pub quality: Option<i32>,
}

impl EncodeOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    fn validate(&self, buffer_len: usize) -> Result<EncodeParams> {
        let (Some(width), Some(height)) = (self.width, self.height) else {
            return Err(Error::invalid_input(
                "Width & height of the buffer is not provided.",
            ));
        };
        let needed = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or_else(|| Error::invalid_input(format!("{width}x{height} RGB image is too large")))?;
        if buffer_len < needed {
            return Err(Error::invalid_input(format!(
                "pixel buffer holds {buffer_len} bytes but {width}x{height} RGB needs {needed}"
            )));
        }
        Ok(EncodeParams {
            width,
            height,
            quality: self.quality.unwrap_or(DEFAULT_QUALITY),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct EncodeParams {
    width: u32,
    height: u32,
    quality: i32,
}

/// Packed RGB pixels produced by [`Runtime::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// `width * height * 3` bytes, row-major, no padding.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Runtime {
    /// Compresses packed RGB pixels into a JPEG once the module is ready.
    ///
    /// Options are validated before waiting, so a missing width or height
    /// fails straight away even if the module never comes up.
    pub async fn encode(&self, pixels: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
        let params = options.validate(pixels.len())?;
        self.ready().await;
        self.encode_validated(pixels, params)
    }

    /// Same as [`encode`](Self::encode), but fails with [`Error::NotReady`]
    /// instead of waiting for the module.
    pub fn encode_blocking(&self, pixels: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
        let params = options.validate(pixels.len())?;
        self.encode_validated(pixels, params)
    }

    /// Decompresses a JPEG into packed RGB once the module is ready.
    pub async fn decode(&self, jpeg: &[u8]) -> Result<DecodedImage> {
        self.ready().await;
        self.decode_blocking(jpeg)
    }

    /// Same as [`decode`](Self::decode), but fails with [`Error::NotReady`]
    /// instead of waiting for the module.
    pub fn decode_blocking(&self, jpeg: &[u8]) -> Result<DecodedImage> {
        debug!(bytes = jpeg.len(), "decode requested");
        self.call(|module| marshal::decode_raw(module, jpeg))
    }

    fn encode_validated(&self, pixels: &[u8], params: EncodeParams) -> Result<Vec<u8>> {
        debug!(?params, bytes = pixels.len(), "encode requested");
        let EncodeParams {
            width,
            height,
            quality,
        } = params;
        self.call(|module| marshal::encode_raw(module, pixels, width, height, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dimensions_are_rejected() {
        let options = EncodeOptions {
            width: Some(4),
            ..EncodeOptions::default()
        };
        let err = options.validate(48).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidInput("Width & height of the buffer is not provided.".into())
        );
        assert_eq!(err.code(), None);
    }

    #[test]
    fn quality_defaults_only_when_unset() {
        let params = EncodeOptions::new(2, 2).validate(12).unwrap();
        assert_eq!(params.quality, DEFAULT_QUALITY);
        let params = EncodeOptions::new(2, 2).with_quality(0).validate(12).unwrap();
        assert_eq!(params.quality, 0);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let err = EncodeOptions::new(4, 4).validate(47).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        // zero dimensions need no pixels; the codec reports them.
        assert!(EncodeOptions::new(0, 0).validate(0).is_ok());
    }
}
