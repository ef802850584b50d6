//! Moves one encode or decode call across the linear-memory boundary.
//!
//! Each call runs inside a [`CallFrame`]: input copied in, output slots zeroed
//! on the scratch stack, entry point invoked, slots read back. Address slots
//! are taken by the frame as they are read, before the status is looked at, so
//! success and failure release exactly the same blocks.

use crate::api::DecodedImage;
use crate::error::{Error, Result};
use crate::frame::{Address, CallFrame, Count, OutputSlot};
use crate::sys::{status, Module};
use tracing::{debug, warn};

pub(crate) fn encode_raw(
    module: &mut Module,
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: i32,
) -> Result<Vec<u8>> {
    let mut frame = CallFrame::enter(module);
    let input = frame.copy_in(pixels)?;
    let out_buf: OutputSlot<Address> = frame.slot()?;
    let out_len: OutputSlot<Count> = frame.slot()?;
    let out_msg: OutputSlot<Address> = frame.slot()?;

    let code = frame.module().encode_jpeg(
        input,
        width,
        height,
        quality,
        out_buf.addr(),
        out_len.addr(),
        out_msg.addr(),
    );

    let buf_addr = frame.take(out_buf)?;
    let msg_addr = frame.take(out_msg)?;
    let len = frame.count(out_len)?;

    if code != status::OK {
        return Err(native_failure(&frame, "encode", code, msg_addr));
    }
    debug!(width, height, quality, bytes = len, "encoded jpeg");
    frame.copy_out(buf_addr, len as usize)
}

pub(crate) fn decode_raw(module: &mut Module, jpeg: &[u8]) -> Result<DecodedImage> {
    let mut frame = CallFrame::enter(module);
    let input = frame.copy_in(jpeg)?;
    let out_buf: OutputSlot<Address> = frame.slot()?;
    let out_width: OutputSlot<Count> = frame.slot()?;
    let out_height: OutputSlot<Count> = frame.slot()?;
    let out_msg: OutputSlot<Address> = frame.slot()?;

    let code = frame.module().decode_jpeg(
        input,
        jpeg.len() as u32,
        out_buf.addr(),
        out_width.addr(),
        out_height.addr(),
        out_msg.addr(),
    );

    let buf_addr = frame.take(out_buf)?;
    let msg_addr = frame.take(out_msg)?;
    let width = frame.count(out_width)?;
    let height = frame.count(out_height)?;

    if code != status::OK {
        return Err(native_failure(&frame, "decode", code, msg_addr));
    }
    // the codec always emits packed RGB.
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or(Error::OutOfBounds {
            addr: buf_addr,
            len: usize::MAX,
        })?;
    debug!(width, height, bytes = jpeg.len(), "decoded jpeg");
    Ok(DecodedImage {
        data: frame.copy_out(buf_addr, len)?,
        width,
        height,
    })
}

fn native_failure(frame: &CallFrame<'_>, op: &str, code: i32, msg_addr: u32) -> Error {
    let err = Error::native(code, frame.message(msg_addr));
    warn!(op, code, status = status::name(code), %err, "native call failed");
    err
}
