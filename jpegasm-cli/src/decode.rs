use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use jpegasm::DecodedImage;
use tracing::debug;

use crate::cli::{DecodeArgs, PixelFormat};

pub async fn run_decode(args: &DecodeArgs, out_path: &Path) -> Result<()> {
    let jpeg = fs::read(&args.input)
        .with_context(|| format!("Failed to read JPEG file {}", args.input.display()))?;

    let decoded = jpegasm::decode(&jpeg)
        .await
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;
    println!("{}x{}", decoded.width, decoded.height);

    debug!(format = ?args.format, out = %out_path.display(), "writing pixels");
    let bytes = match args.format {
        PixelFormat::Raw => decoded.data,
        PixelFormat::Ppm => to_ppm(&decoded),
    };
    fs::write(out_path, bytes)
        .with_context(|| format!("Failed to write output {}", out_path.display()))?;
    println!("Wrote {}", out_path.display());
    Ok(())
}

fn to_ppm(image: &DecodedImage) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", image.width, image.height);
    let mut out = Vec::with_capacity(header.len() + image.data.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&image.data);
    out
}
