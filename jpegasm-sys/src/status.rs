//! Status codes returned by the codec entry points.
//!
//! Codes below 128 follow libjpeg's message table numbering; 128 and above
//! are specific to this module.

pub const OK: i32 = 0;
pub const EMPTY_IMAGE: i32 = 33;
pub const IMAGE_TOO_BIG: i32 = 40;
pub const INPUT_EMPTY: i32 = 41;
pub const INPUT_EOF: i32 = 42;
pub const NOT_IMPLEMENTED: i32 = 46;
pub const NO_SOI: i32 = 55;
pub const OUT_OF_MEMORY: i32 = 56;
pub const CODEC_FAILURE: i32 = 128;
pub const BAD_ADDRESS: i32 = 129;

/// Largest width or height either entry point accepts.
pub const MAX_DIMENSION: u32 = 65500;

/// Symbolic name of a status code, for logs.
pub fn name(code: i32) -> &'static str {
    match code {
        OK => "OK",
        EMPTY_IMAGE => "EMPTY_IMAGE",
        IMAGE_TOO_BIG => "IMAGE_TOO_BIG",
        INPUT_EMPTY => "INPUT_EMPTY",
        INPUT_EOF => "INPUT_EOF",
        NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
        NO_SOI => "NO_SOI",
        OUT_OF_MEMORY => "OUT_OF_MEMORY",
        CODEC_FAILURE => "CODEC_FAILURE",
        BAD_ADDRESS => "BAD_ADDRESS",
        _ => "UNKNOWN",
    }
}
