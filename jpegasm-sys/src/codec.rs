//! The two codec entry points.
//!
//! Both take and return plain integers only: addresses into linear memory,
//! dimensions, and a status code. Results are written through caller-provided
//! output slots and live in fresh heap blocks that the caller must free.

use crate::status;
use crate::Module;
use jpeg_decoder::PixelFormat;
use std::io::ErrorKind;

struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn bad_address() -> Self {
        Self::new(status::BAD_ADDRESS, "Buffer out of bounds of linear memory")
    }
}

impl Module {
    /// Compresses `width * height` packed RGB pixels starting at `input`.
    ///
    /// On success writes the JPEG address to `out_buf_slot` and its length to
    /// `out_len_slot`. On failure writes the address of a NUL-terminated
    /// diagnostic to `out_msg_slot` and returns its status.
    pub fn encode_jpeg(
        &mut self,
        input: u32,
        width: u32,
        height: u32,
        quality: i32,
        out_buf_slot: u32,
        out_len_slot: u32,
        out_msg_slot: u32,
    ) -> i32 {
        let jpeg = match self.compress(input, width, height, quality) {
            Ok(jpeg) => jpeg,
            Err(failure) => return self.report(failure, out_msg_slot),
        };
        let addr = match self.publish(&jpeg) {
            Ok(addr) => addr,
            Err(failure) => return self.report(failure, out_msg_slot),
        };
        let mem = self.memory_mut();
        if !(mem.set_u32(out_buf_slot, addr) && mem.set_u32(out_len_slot, jpeg.len() as u32)) {
            mem.free(addr);
            return self.report(Failure::bad_address(), out_msg_slot);
        }
        status::OK
    }

    /// Decompresses `input_len` bytes of JPEG at `input` into packed RGB.
    ///
    /// On success writes the pixel address, width and height to their slots;
    /// the pixel block is always `width * height * 3` bytes.
    pub fn decode_jpeg(
        &mut self,
        input: u32,
        input_len: u32,
        out_buf_slot: u32,
        out_width_slot: u32,
        out_height_slot: u32,
        out_msg_slot: u32,
    ) -> i32 {
        let (rgb, width, height) = match self.decompress(input, input_len) {
            Ok(decoded) => decoded,
            Err(failure) => return self.report(failure, out_msg_slot),
        };
        let addr = match self.publish(&rgb) {
            Ok(addr) => addr,
            Err(failure) => return self.report(failure, out_msg_slot),
        };
        let mem = self.memory_mut();
        if !(mem.set_u32(out_buf_slot, addr)
            && mem.set_u32(out_width_slot, width)
            && mem.set_u32(out_height_slot, height))
        {
            mem.free(addr);
            return self.report(Failure::bad_address(), out_msg_slot);
        }
        status::OK
    }

    fn compress(&self, input: u32, width: u32, height: u32, quality: i32) -> Result<Vec<u8>, Failure> {
        if width == 0 || height == 0 {
            return Err(Failure::new(
                status::EMPTY_IMAGE,
                "Empty JPEG image (DNL not supported)",
            ));
        }
        if width > status::MAX_DIMENSION || height > status::MAX_DIMENSION {
            return Err(too_big());
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(Failure::bad_address)?;
        let pixels = self
            .memory()
            .read(input, len)
            .ok_or_else(Failure::bad_address)?;

        // libjpeg clamps rather than rejects out-of-range qualities.
        let quality = quality.clamp(1, 100) as u8;
        let mut out = Vec::new();
        jpeg_encoder::Encoder::new(&mut out, quality)
            .encode(
                pixels,
                width as u16,
                height as u16,
                jpeg_encoder::ColorType::Rgb,
            )
            .map_err(|err| Failure::new(status::CODEC_FAILURE, err.to_string()))?;
        Ok(out)
    }

    fn decompress(&self, input: u32, input_len: u32) -> Result<(Vec<u8>, u32, u32), Failure> {
        let data = self
            .memory()
            .read(input, input_len as usize)
            .ok_or_else(Failure::bad_address)?;
        match data {
            [] => return Err(Failure::new(status::INPUT_EMPTY, "Empty input file")),
            [_] => return Err(premature_eof()),
            [0xFF, 0xD8, ..] => {}
            [a, b, ..] => {
                return Err(Failure::new(
                    status::NO_SOI,
                    format!("Not a JPEG file: starts with 0x{a:02x} 0x{b:02x}"),
                ));
            }
        }

        let mut decoder = jpeg_decoder::Decoder::new(data);
        let pixels = decoder.decode().map_err(decoder_failure)?;
        let info = decoder
            .info()
            .ok_or_else(|| Failure::new(status::CODEC_FAILURE, "Missing frame header"))?;
        let width = u32::from(info.width);
        let height = u32::from(info.height);
        if width == 0 || height == 0 {
            return Err(Failure::new(
                status::EMPTY_IMAGE,
                "Empty JPEG image (DNL not supported)",
            ));
        }
        if width > status::MAX_DIMENSION || height > status::MAX_DIMENSION {
            return Err(too_big());
        }
        let rgb = to_rgb(pixels, info.pixel_format);
        if rgb.len() != width as usize * height as usize * 3 {
            return Err(premature_eof());
        }
        Ok((rgb, width, height))
    }

    /// Moves an owned result into a fresh heap block.
    fn publish(&mut self, bytes: &[u8]) -> Result<u32, Failure> {
        let mem = self.memory_mut();
        let size = u32::try_from(bytes.len()).map_err(|_| out_of_memory())?;
        let addr = mem.malloc(size);
        if addr == 0 {
            return Err(out_of_memory());
        }
        mem.write(addr, bytes);
        Ok(addr)
    }

    fn report(&mut self, failure: Failure, out_msg_slot: u32) -> i32 {
        let mem = self.memory_mut();
        let msg = mem.alloc_string(&failure.message);
        if msg != 0 && !mem.set_u32(out_msg_slot, msg) {
            mem.free(msg);
        }
        failure.code
    }
}

fn too_big() -> Failure {
    Failure::new(
        status::IMAGE_TOO_BIG,
        format!(
            "Maximum supported image dimension is {} pixels",
            status::MAX_DIMENSION
        ),
    )
}

fn premature_eof() -> Failure {
    Failure::new(status::INPUT_EOF, "Premature end of input file")
}

fn out_of_memory() -> Failure {
    Failure::new(status::OUT_OF_MEMORY, "Insufficient memory")
}

fn decoder_failure(err: jpeg_decoder::Error) -> Failure {
    match err {
        jpeg_decoder::Error::Unsupported(feature) => Failure::new(
            status::NOT_IMPLEMENTED,
            format!("Not implemented yet: {feature:?}"),
        ),
        jpeg_decoder::Error::Format(detail) => {
            Failure::new(status::CODEC_FAILURE, format!("Corrupt JPEG data: {detail}"))
        }
        jpeg_decoder::Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => premature_eof(),
        other => Failure::new(status::CODEC_FAILURE, other.to_string()),
    }
}

/// Normalizes decoder output to packed 8-bit RGB.
fn to_rgb(pixels: Vec<u8>, format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::RGB24 => pixels,
        PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        PixelFormat::L16 => pixels
            .chunks_exact(2)
            .flat_map(|px| {
                let l = px[0];
                [l, l, l]
            })
            .collect(),
        PixelFormat::CMYK32 => pixels
            .chunks_exact(4)
            .flat_map(|px| {
                let k = 255 - u16::from(px[3]);
                let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                [channel(px[0]), channel(px[1]), channel(px[2])]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{status, Module, ModuleConfig};

    const SIZE_OF_POINTER: u32 = 4;

    fn blue_image(width: u32, height: u32) -> Vec<u8> {
        [0x00, 0x00, 0xFF].repeat((width * height) as usize)
    }

    fn module() -> Module {
        Module::instantiate(ModuleConfig::default()).expect("default config instantiates")
    }

    /// Runs `encode_jpeg` the way a foreign caller would; returns (status, buf, len, msg).
    fn raw_encode(m: &mut Module, rgb: &[u8], w: u32, h: u32, q: i32) -> (i32, u32, u32, String) {
        let stack = m.memory().stack_save();
        let input = m.memory_mut().malloc(rgb.len() as u32);
        assert!(m.memory_mut().write(input, rgb));
        let out_buf = m.memory_mut().stack_alloc(SIZE_OF_POINTER);
        let out_len = m.memory_mut().stack_alloc(SIZE_OF_POINTER);
        let out_msg = m.memory_mut().stack_alloc(SIZE_OF_POINTER);
        for slot in [out_buf, out_len, out_msg] {
            m.memory_mut().set_u32(slot, 0);
        }

        let result = m.encode_jpeg(input, w, h, q, out_buf, out_len, out_msg);

        let mem = m.memory_mut();
        let buf = mem.get_u32(out_buf).unwrap();
        let len = mem.get_u32(out_len).unwrap();
        let msg_ptr = mem.get_u32(out_msg).unwrap();
        let msg = mem.utf8_to_string(msg_ptr);
        mem.free(input);
        mem.free(msg_ptr);
        mem.stack_restore(stack);
        (result, buf, len, msg)
    }

    #[test]
    fn encodes_jpeg() {
        let mut m = module();
        let (result, buf, len, msg) = raw_encode(&mut m, &blue_image(32, 32), 32, 32, 80);
        assert_eq!(result, status::OK);
        assert!(buf > 0);
        assert!(len > 0);
        assert!(msg.is_empty());
        let jpeg = m.memory().read(buf, len as usize).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        m.memory_mut().free(buf);
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn cannot_encode_an_image_with_invalid_dimensions() {
        let mut m = module();
        let (result, buf, len, msg) = raw_encode(&mut m, &[], 0, 0, 80);
        assert_eq!(result, status::EMPTY_IMAGE);
        assert_eq!(buf, 0);
        assert_eq!(len, 0);
        assert_eq!(msg, "Empty JPEG image (DNL not supported)");
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn rejects_input_past_end_of_memory() {
        let mut m = module();
        let size = m.memory().size();
        let stack = m.memory().stack_save();
        let slots: Vec<u32> = (0..3).map(|_| m.memory_mut().stack_alloc(4)).collect();
        let result = m.encode_jpeg(size - 16, 32, 32, 80, slots[0], slots[1], slots[2]);
        assert_eq!(result, status::BAD_ADDRESS);
        let msg = m.memory().get_u32(slots[2]).unwrap();
        m.memory_mut().free(msg);
        m.memory_mut().stack_restore(stack);
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    /// Runs `decode_jpeg`; returns (status, buf, width, height, msg).
    fn raw_decode(m: &mut Module, jpeg: &[u8]) -> (i32, u32, u32, u32, String) {
        let stack = m.memory().stack_save();
        let input = m.memory_mut().malloc(jpeg.len() as u32);
        assert!(m.memory_mut().write(input, jpeg));
        let slots: Vec<u32> = (0..4)
            .map(|_| {
                let slot = m.memory_mut().stack_alloc(SIZE_OF_POINTER);
                m.memory_mut().set_u32(slot, 0);
                slot
            })
            .collect();

        let result = m.decode_jpeg(
            input,
            jpeg.len() as u32,
            slots[0],
            slots[1],
            slots[2],
            slots[3],
        );

        let mem = m.memory_mut();
        let values: Vec<u32> = slots.iter().map(|s| mem.get_u32(*s).unwrap()).collect();
        let msg = mem.utf8_to_string(values[3]);
        mem.free(input);
        mem.free(values[3]);
        mem.stack_restore(stack);
        (result, values[0], values[1], values[2], msg)
    }

    #[test]
    fn decodes_jpeg() {
        let mut m = module();
        let (_, buf, len, _) = raw_encode(&mut m, &blue_image(32, 32), 32, 32, 80);
        let jpeg = m.memory().read(buf, len as usize).unwrap().to_vec();
        m.memory_mut().free(buf);

        let (result, pixels, width, height, msg) = raw_decode(&mut m, &jpeg);
        assert_eq!(result, status::OK);
        assert!(pixels > 0);
        assert_eq!((width, height), (32, 32));
        assert!(msg.is_empty());

        let rgb = m.memory().read(pixels, 32 * 32 * 3).unwrap();
        // lossy, but solid blue stays blue.
        assert!(rgb.chunks_exact(3).all(|px| px[2] > 180 && px[0] < 60 && px[1] < 60));
        m.memory_mut().free(pixels);
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn cannot_decode_a_corrupted_jpeg() {
        let mut m = module();
        let (result, buf, width, height, msg) = raw_decode(&mut m, &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(result, status::NO_SOI);
        assert_eq!((buf, width, height), (0, 0, 0));
        assert_eq!(msg, "Not a JPEG file: starts with 0xaa 0xbb");
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn reports_empty_and_truncated_input() {
        let mut m = module();
        let (result, _, _, _, msg) = raw_decode(&mut m, &[]);
        assert_eq!(result, status::INPUT_EMPTY);
        assert_eq!(msg, "Empty input file");

        let (result, ..) = raw_decode(&mut m, &[0xFF]);
        assert_eq!(result, status::INPUT_EOF);

        let (result, buf, _, _, msg) = raw_decode(&mut m, &[0xFF, 0xD8, 0xFF]);
        assert_ne!(result, status::OK);
        assert_eq!(buf, 0);
        assert!(!msg.is_empty());
        assert_eq!(m.memory().stats().live_allocations, 0);
    }

    #[test]
    fn quality_is_clamped() {
        let mut m = module();
        let rgb = blue_image(16, 16);
        for q in [-5, 0, 1, 100, 250] {
            let (result, buf, _, _) = raw_encode(&mut m, &rgb, 16, 16, q);
            assert_eq!(result, status::OK, "quality {q}");
            m.memory_mut().free(buf);
        }
    }
}
