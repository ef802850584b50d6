use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use jpegasm::{EncodeOptions, CHANNELS};
use tracing::debug;

use crate::cli::EncodeArgs;

pub async fn run_encode(args: &EncodeArgs, out_path: &Path) -> Result<()> {
    let pixels = fs::read(&args.input)
        .with_context(|| format!("Failed to read RGB file {}", args.input.display()))?;
    check_raw_len(pixels.len(), args.width, args.height)
        .with_context(|| format!("Unexpected size of {}", args.input.display()))?;

    let mut options = EncodeOptions::new(args.width, args.height);
    options.quality = args.quality;
    debug!(?options, out = %out_path.display(), "encoding");
    let jpeg = jpegasm::encode(&pixels, &options)
        .await
        .with_context(|| format!("Failed to encode {}", args.input.display()))?;

    fs::write(out_path, &jpeg)
        .with_context(|| format!("Failed to write output {}", out_path.display()))?;
    println!("Wrote {} ({} bytes)", out_path.display(), jpeg.len());
    Ok(())
}

/// A raw file must hold exactly `width * height` packed RGB pixels.
fn check_raw_len(len: usize, width: u32, height: u32) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS));
    ensure!(
        expected == Some(len),
        "file holds {len} bytes, expected {width}x{height}x{CHANNELS}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_files_must_match_the_dimensions() {
        assert!(check_raw_len(2 * 3 * 3, 2, 3).is_ok());
        assert!(check_raw_len(0, 0, 7).is_ok());

        let err = check_raw_len(17, 2, 3).unwrap_err();
        assert_eq!(err.to_string(), "file holds 17 bytes, expected 2x3x3");
        assert!(check_raw_len(19, 2, 3).is_err());
    }
}
