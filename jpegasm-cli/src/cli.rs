use std::path::PathBuf;

use clap::{builder::ValueHint, Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for jpegasm.
#[derive(Parser, Debug)]
#[command(
    name = "jpegasm",
    about = "Encode packed RGB to JPEG and decode JPEG back to RGB.",
    author,
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Log more (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compress a raw packed-RGB file into a JPEG
    Encode(EncodeArgs),
    /// Decompress a JPEG into raw packed RGB or a PPM
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Raw RGB input, width*height*3 bytes, row-major
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Image width in pixels
    #[arg(long, short = 'W')]
    pub width: u32,

    /// Image height in pixels
    #[arg(long, short = 'H')]
    pub height: u32,

    /// JPEG quality (0-100; defaults to 90)
    #[arg(long, short = 'q', value_parser = clap::value_parser!(i32).range(0..=100))]
    pub quality: Option<i32>,

    /// Output JPEG path (defaults to the input with a .jpg extension)
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// JPEG input
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output pixel container
    #[arg(long, short = 'f', value_enum, default_value_t = PixelFormat::Ppm)]
    pub format: PixelFormat,

    /// Output path (defaults to the input with the format's extension)
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Bare packed RGB bytes
    Raw,
    /// Binary PPM (P6)
    Ppm,
}

impl PixelFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PixelFormat::Raw => "rgb",
            PixelFormat::Ppm => "ppm",
        }
    }
}
