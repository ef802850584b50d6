use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod decode;
mod encode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);
    run(args.command).await
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cmd: cli::Command) -> Result<()> {
    match cmd {
        cli::Command::Encode(args) => {
            let out_path = args
                .out
                .clone()
                .unwrap_or_else(|| sibling_with_extension(&args.input, "jpg"));
            encode::run_encode(&args, &out_path).await
        }
        cli::Command::Decode(args) => {
            let out_path = args
                .out
                .clone()
                .unwrap_or_else(|| sibling_with_extension(&args.input, args.format.extension()));
            decode::run_decode(&args, &out_path).await
        }
    }
}

/// `dir/name.ext` becomes `dir/name.<extension>`.
fn sibling_with_extension(input: &Path, extension: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input.file_stem().unwrap_or_else(|| OsStr::new("image"));

    let mut filename = stem.to_os_string();
    filename.push(".");
    filename.push(extension);

    let mut out = parent.to_path_buf();
    out.push(filename);
    out
}
