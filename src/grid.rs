//! mapping between a byte payload and a rectangular RGBA pixel grid.
//!
//! a packed grid holds, in order: the payload length as a little-endian `u64`,
//! the payload itself, and zeros up to the end of the last pixel.

use crate::{try_alloc_empty, try_alloc_zeroed, Error, Result};
use core::fmt::{self, Display};

/// number of bytes in one pixel (8-bit RGBA)
pub const BYTES_PER_PIXEL: usize = 4;

/// width of the length prefix at the start of every packed grid
pub const LENGTH_PREFIX_BYTES: usize = core::mem::size_of::<u64>();

/// why a pixel grid does not hold a valid payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
	/// the grid is too small to hold even the length prefix
	Truncated {
		/// size of the grid in bytes
		len: usize,
	},
	/// the length prefix claims more bytes than the grid has room for
	LengthExceedsCapacity {
		/// length read from the prefix
		declared: u64,
		/// bytes available after the prefix
		capacity: usize,
	},
	/// a byte past the end of the payload is not zero
	NonZeroPadding {
		/// offset of the first nonzero padding byte within the grid
		offset: usize,
	},
}

impl Display for PayloadError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Truncated { len } => {
				write!(f, "{len} bytes of pixel data cannot hold a length prefix")
			}
			Self::LengthExceedsCapacity { declared, capacity } => write!(
				f,
				"declared payload of {declared} bytes exceeds the {capacity} bytes available"
			),
			Self::NonZeroPadding { offset } => write!(f, "nonzero padding at offset {offset}"),
		}
	}
}

impl std::error::Error for PayloadError {}

/// smallest near-square `(width, height)` able to hold `needed_bytes` bytes
/// at `bytes_per_pixel` bytes per pixel.
///
/// starts from a square of side `floor(sqrt(pixels))` and grows the smaller
/// side until the area is big enough, growing width when both sides are equal.
/// the result is never smaller than 1×1.
///
/// returns `None` if the area of such a rectangle does not fit in a `usize`.
///
/// # Panics
///
/// panics if `bytes_per_pixel` is zero.
pub fn compute_dimensions(needed_bytes: usize, bytes_per_pixel: usize) -> Option<(usize, usize)> {
	assert!(bytes_per_pixel > 0, "bytes per pixel must be nonzero");
	let pixels = needed_bytes.div_ceil(bytes_per_pixel).max(1);
	let side = floor_sqrt(pixels);
	let (mut width, mut height) = (side, side);
	while width.checked_mul(height)? < pixels {
		if height < width {
			height = height.checked_add(1)?;
		} else {
			width = width.checked_add(1)?;
		}
	}
	Some((width, height))
}

fn floor_sqrt(n: usize) -> usize {
	// the float estimate can be off by one either way for large n
	let mut root = (n as f64).sqrt() as usize;
	while root.checked_mul(root).map_or(true, |sq| sq > n) {
		root -= 1;
	}
	while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
		root += 1;
	}
	root
}

/// an RGBA image held in memory, 4 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
	width: u32,
	height: u32,
	pixels: Vec<u8>,
}

impl PixelGrid {
	/// wrap raw RGBA bytes.
	///
	/// returns `None` unless `pixels` is exactly `width * height * 4` bytes long.
	pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
		let expected = (width as usize)
			.checked_mul(height as usize)?
			.checked_mul(BYTES_PER_PIXEL)?;
		(pixels.len() == expected).then_some(Self {
			width,
			height,
			pixels,
		})
	}

	/// width of the grid in pixels
	pub fn width(&self) -> u32 {
		self.width
	}

	/// height of the grid in pixels
	pub fn height(&self) -> u32 {
		self.height
	}

	/// RGBA bytes, row by row
	pub fn pixels(&self) -> &[u8] {
		&self.pixels
	}

	/// give up the grid, keeping its bytes
	pub fn into_pixels(self) -> Vec<u8> {
		self.pixels
	}
}

/// lay `payload` out in a freshly allocated pixel grid.
///
/// the grid is the smallest near-square one that fits the length prefix and
/// the payload; everything after the payload is zero.
pub fn pack(payload: &[u8]) -> Result<PixelGrid> {
	let too_large = || Error::TooLargeForImage(payload.len());
	let needed = payload
		.len()
		.checked_add(LENGTH_PREFIX_BYTES)
		.ok_or_else(too_large)?;
	let (width, height) = compute_dimensions(needed, BYTES_PER_PIXEL).ok_or_else(too_large)?;
	let len = width
		.checked_mul(height)
		.and_then(|area| area.checked_mul(BYTES_PER_PIXEL))
		.ok_or_else(too_large)?;
	let width = u32::try_from(width).map_err(|_| too_large())?;
	let height = u32::try_from(height).map_err(|_| too_large())?;

	let mut pixels = try_alloc_zeroed(len)?;
	let declared = payload.len() as u64;
	pixels[..LENGTH_PREFIX_BYTES].copy_from_slice(&declared.to_le_bytes());
	pixels[LENGTH_PREFIX_BYTES..needed].copy_from_slice(payload);
	log::debug!(
		"packed {} bytes into {width}x{height} pixels ({} bytes of padding)",
		payload.len(),
		len - needed
	);
	Ok(PixelGrid {
		width,
		height,
		pixels,
	})
}

/// borrow the payload stored in `pixels`, checking that the grid is well formed.
pub fn payload(pixels: &[u8]) -> Result<&[u8]> {
	if pixels.len() < LENGTH_PREFIX_BYTES {
		return Err(PayloadError::Truncated { len: pixels.len() }.into());
	}
	let (prefix, rest) = pixels.split_at(LENGTH_PREFIX_BYTES);
	let mut declared = [0; LENGTH_PREFIX_BYTES];
	declared.copy_from_slice(prefix);
	let declared = u64::from_le_bytes(declared);
	let len = match usize::try_from(declared) {
		Ok(len) if len <= rest.len() => len,
		_ => {
			return Err(PayloadError::LengthExceedsCapacity {
				declared,
				capacity: rest.len(),
			}
			.into())
		}
	};

	let (payload, padding) = rest.split_at(len);
	if let Some(i) = padding.iter().position(|&b| b != 0) {
		return Err(PayloadError::NonZeroPadding {
			offset: LENGTH_PREFIX_BYTES + len + i,
		}
		.into());
	}
	Ok(payload)
}

/// copy the payload stored in `pixels` into a new vector.
pub fn unpack(pixels: &[u8]) -> Result<Vec<u8>> {
	let payload = payload(pixels)?;
	let mut out = try_alloc_empty(payload.len())?;
	out.extend_from_slice(payload);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::{rngs::StdRng, Rng, SeedableRng};
	use rstest::rstest;

	fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
		let mut rng = StdRng::seed_from_u64(seed);
		let mut data = vec![0; len];
		rng.fill(&mut data[..]);
		data
	}

	#[rstest]
	#[case(0, (1, 1))]
	#[case(1, (1, 1))]
	#[case(4, (1, 1))]
	#[case(8, (2, 1))]
	#[case(16, (2, 2))]
	#[case(17, (3, 2))]
	#[case(20, (3, 2))]
	#[case(24, (3, 2))]
	#[case(25, (3, 3))]
	#[case(36, (3, 3))]
	#[case(40, (4, 3))]
	#[case(4104, (33, 32))]
	fn test_dimensions(#[case] needed: usize, #[case] expected: (usize, usize)) {
		assert_eq!(compute_dimensions(needed, BYTES_PER_PIXEL), Some(expected));
	}

	#[rstest]
	#[case(17, 1, Some((5, 4)))]
	#[case(10, 3, Some((2, 2)))]
	#[case(0, 1, Some((1, 1)))]
	#[case(usize::MAX, 1, None)]
	#[case(usize::MAX - 5, 1, None)]
	#[case(usize::MAX, BYTES_PER_PIXEL, Some((1 << (usize::BITS / 2 - 1), 1 << (usize::BITS / 2 - 1))))]
	fn test_dimensions_other_strides(
		#[case] needed: usize,
		#[case] bytes_per_pixel: usize,
		#[case] expected: Option<(usize, usize)>,
	) {
		assert_eq!(compute_dimensions(needed, bytes_per_pixel), expected);
	}

	#[test]
	fn test_dimensions_follow_growth_rule() {
		for needed in 0..20_000 {
			let (w, h) = compute_dimensions(needed, BYTES_PER_PIXEL).unwrap();
			let pixels = needed.div_ceil(BYTES_PER_PIXEL).max(1);
			let side = floor_sqrt(pixels);
			assert!(w * h * BYTES_PER_PIXEL >= needed, "{needed} does not fit {w}x{h}");
			// only three rectangles are reachable from the starting square
			assert!(
				[(side, side), (side + 1, side), (side + 1, side + 1)].contains(&(w, h)),
				"{needed} gave {w}x{h} from side {side}"
			);
			// and the step before the last one must not have been big enough
			if (w, h) == (side + 1, side) {
				assert!(side * side < pixels);
			} else if (w, h) == (side + 1, side + 1) {
				assert!((side + 1) * side < pixels);
			}
		}
	}

	#[test]
	fn test_floor_sqrt() {
		for n in 0..10_000usize {
			let r = floor_sqrt(n);
			assert!(r * r <= n && (r + 1) * (r + 1) > n, "floor_sqrt({n}) = {r}");
		}
		assert_eq!(floor_sqrt(usize::MAX), (1usize << (usize::BITS / 2)) - 1);
	}

	#[test]
	#[should_panic]
	fn test_zero_stride_panics() {
		compute_dimensions(10, 0);
	}

	#[test]
	fn test_pack_empty() {
		let grid = pack(&[]).unwrap();
		assert_eq!((grid.width(), grid.height()), (2, 1));
		assert_eq!(grid.pixels(), &[0; 8]);
		assert_eq!(unpack(grid.pixels()).unwrap(), Vec::<u8>::new());
	}

	#[test]
	fn test_pack_layout() {
		let grid = pack(b"hello, world").unwrap();
		assert_eq!((grid.width(), grid.height()), (3, 2));
		let pixels = grid.pixels();
		assert_eq!(pixels.len(), 24);
		assert_eq!(&pixels[..8], &12u64.to_le_bytes());
		assert_eq!(&pixels[8..20], b"hello, world");
		assert_eq!(&pixels[20..], &[0; 4]);
	}

	#[rstest]
	#[case(1)]
	#[case(7)]
	#[case(8)]
	#[case(4088)]
	#[case(4096)]
	#[case(65_537)]
	#[case(3 << 20)]
	fn test_round_trip(#[case] len: usize) {
		let data = random_bytes(len, len as u64);
		let grid = pack(&data).unwrap();
		let capacity = grid.pixels().len();
		assert_eq!(
			capacity,
			grid.width() as usize * grid.height() as usize * BYTES_PER_PIXEL
		);
		assert!(capacity >= LENGTH_PREFIX_BYTES + len);
		assert!(grid.pixels()[LENGTH_PREFIX_BYTES + len..].iter().all(|&b| b == 0));
		assert_eq!(unpack(grid.pixels()).unwrap(), data);
	}

	#[test]
	fn test_truncated_grid() {
		let err = unpack(&[1, 0, 0]).unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidPayload(PayloadError::Truncated { len: 3 })
		));
	}

	#[test]
	fn test_length_exceeds_capacity() {
		let mut pixels = pack(b"abcd").unwrap().into_pixels();
		let capacity = pixels.len() - LENGTH_PREFIX_BYTES;
		pixels[..8].copy_from_slice(&(capacity as u64 + 1).to_le_bytes());
		let err = unpack(&pixels).unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidPayload(PayloadError::LengthExceedsCapacity { declared, capacity: c })
				if declared == capacity as u64 + 1 && c == capacity
		));

		pixels[..8].copy_from_slice(&u64::MAX.to_le_bytes());
		let err = unpack(&pixels).unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidPayload(PayloadError::LengthExceedsCapacity { declared: u64::MAX, .. })
		));
	}

	#[test]
	fn test_length_filling_whole_grid() {
		let mut pixels = vec![0xEE; 16];
		pixels[..8].copy_from_slice(&8u64.to_le_bytes());
		assert_eq!(payload(&pixels).unwrap(), &[0xEE; 8]);
	}

	#[test]
	fn test_nonzero_padding() {
		let mut pixels = pack(b"abc").unwrap().into_pixels();
		let last = pixels.len() - 1;
		pixels[last] = 1;
		let err = unpack(&pixels).unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidPayload(PayloadError::NonZeroPadding { offset }) if offset == last
		));
	}

	#[test]
	fn test_from_rgba_checks_length() {
		assert!(PixelGrid::from_rgba(2, 2, vec![0; 16]).is_some());
		assert!(PixelGrid::from_rgba(2, 2, vec![0; 15]).is_none());
		assert!(PixelGrid::from_rgba(0, 5, vec![]).is_some());
	}
}
