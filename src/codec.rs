//! PNG encoding and decoding of pixel grids.
//!
//! encoding always produces 8-bit RGBA. decoding accepts any PNG the `png`
//! crate understands and normalises it to 8-bit RGBA, so that images this
//! crate did not produce still reach [`crate::unpack`] (which then rejects them).

use crate::grid::{PixelGrid, BYTES_PER_PIXEL};
use crate::{try_alloc_zeroed, Error, Result};
use png::{BitDepth, ColorType, Transformations};
use std::io::{Read, Write};

fn codec_error(e: impl core::fmt::Display) -> Error {
	Error::Codec(e.to_string())
}

/// write `grid` to `writer` as an 8-bit RGBA PNG.
pub fn encode_png<W: Write>(grid: &PixelGrid, writer: W) -> Result<()> {
	let mut encoder = png::Encoder::new(writer, grid.width(), grid.height());
	encoder.set_color(ColorType::Rgba);
	encoder.set_depth(BitDepth::Eight);
	let mut writer = encoder.write_header().map_err(codec_error)?;
	writer
		.write_image_data(grid.pixels())
		.map_err(codec_error)?;
	writer.finish().map_err(codec_error)
}

/// worst-case expansion of a deflate stream
const MAX_DEFLATE_RATIO: usize = 1032;
/// worst-case growth from the smallest PNG pixel (1 bit) to 8-bit RGBA
const MAX_PIXEL_GROWTH: usize = 32;

/// upper bound on the memory decoding a PNG of `encoded_len` bytes can legitimately need.
///
/// a header claiming more than this cannot be backed by the data that follows it.
pub fn decoded_size_limit(encoded_len: u64) -> usize {
	usize::try_from(encoded_len)
		.unwrap_or(usize::MAX)
		.saturating_mul(MAX_DEFLATE_RATIO * MAX_PIXEL_GROWTH)
		.saturating_add(1 << 20)
}

/// read a PNG from `reader` and convert it to an 8-bit RGBA pixel grid.
///
/// the only bound on memory is the image header; see [`decode_png_with_limit`]
/// for untrusted input.
pub fn decode_png<R: Read>(reader: R) -> Result<PixelGrid> {
	decode_png_with_limit(reader, usize::MAX)
}

/// like [`decode_png`], but fail with [`Error::Codec`] instead of allocating
/// more than `max_bytes` for the image.
pub fn decode_png_with_limit<R: Read>(reader: R, max_bytes: usize) -> Result<PixelGrid> {
	let mut decoder = png::Decoder::new_with_limits(reader, png::Limits { bytes: max_bytes });
	decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
	let mut reader = decoder.read_info().map_err(codec_error)?;

	let (width, height) = {
		let info = reader.info();
		(info.width, info.height)
	};
	let overflow = || Error::Codec(format!("{width}x{height} image does not fit in memory"));
	let area = (width as usize)
		.checked_mul(height as usize)
		.ok_or_else(overflow)?;
	let rgba_len = area.checked_mul(BYTES_PER_PIXEL).ok_or_else(overflow)?;
	// the decoded frame is never wider than RGBA after STRIP_16, so one
	// buffer serves both the decoder output and the in-place conversion.
	let buffer_len = rgba_len.max(reader.output_buffer_size());
	if buffer_len > max_bytes {
		return Err(Error::Codec(format!(
			"{width}x{height} image needs {buffer_len} bytes, more than the limit of {max_bytes}"
		)));
	}
	let mut buffer = try_alloc_zeroed(buffer_len)?;
	let info = reader.next_frame(&mut buffer).map_err(codec_error)?;
	log::debug!(
		"decoded {width}x{height} png ({:?}, {:?})",
		info.color_type,
		info.bit_depth
	);

	convert_to_rgba(&mut buffer, area, info.color_type, info.bit_depth)?;
	buffer.truncate(rgba_len);
	PixelGrid::from_rgba(width, height, buffer)
		.ok_or_else(|| Error::Codec("decoded frame does not match image size".into()))
}

/// expand `area` packed pixels at the front of `buffer` to RGBA, in place.
///
/// pixels are processed back to front so that no source byte is overwritten
/// before it has been read.
fn convert_to_rgba(
	buffer: &mut [u8],
	area: usize,
	color_type: ColorType,
	bit_depth: BitDepth,
) -> Result<()> {
	if bit_depth != BitDepth::Eight {
		return Err(Error::Codec(format!(
			"unsupported decoded bit depth {bit_depth:?}"
		)));
	}
	debug_assert!(buffer.len() >= 4 * area);
	match color_type {
		ColorType::Rgba => {}
		ColorType::Rgb => {
			let mut dest = 4 * area;
			let mut src = 3 * area;
			for _ in 0..area {
				buffer[dest - 1] = 255;
				buffer[dest - 2] = buffer[src - 1];
				buffer[dest - 3] = buffer[src - 2];
				buffer[dest - 4] = buffer[src - 3];
				dest -= 4;
				src -= 3;
			}
		}
		ColorType::Grayscale => {
			let mut dest = 4 * area;
			for src in (0..area).rev() {
				let gray = buffer[src];
				buffer[dest - 4..dest].copy_from_slice(&[gray, gray, gray, 255]);
				dest -= 4;
			}
		}
		ColorType::GrayscaleAlpha => {
			let mut dest = 4 * area;
			let mut src = 2 * area;
			for _ in 0..area {
				let (gray, alpha) = (buffer[src - 2], buffer[src - 1]);
				buffer[dest - 4..dest].copy_from_slice(&[gray, gray, gray, alpha]);
				dest -= 4;
				src -= 2;
			}
		}
		ColorType::Indexed => {
			// EXPAND turns palettes into RGB(A)
			return Err(Error::Codec("palette was not expanded".into()));
		}
	}
	Ok(())
}
