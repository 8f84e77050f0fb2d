//! what a single invocation should do.

use std::path::{Path, PathBuf};

/// direction of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
	/// turn an arbitrary file into a PNG
	Encode,
	/// recover the original file from a PNG
	Decode,
}

impl Mode {
	/// [`Mode::Decode`] if `source` ends in `.png` (in any case),
	/// [`Mode::Encode`] otherwise.
	///
	/// the whole path is matched, not just the extension, so `dir/.png`
	/// decodes. a path that is nothing but `.png` encodes.
	pub fn for_source(source: &Path) -> Self {
		const SUFFIX: &[u8] = b".png";
		let path = source.as_os_str().as_encoded_bytes();
		if path.len() > SUFFIX.len()
			&& path[path.len() - SUFFIX.len()..].eq_ignore_ascii_case(SUFFIX)
		{
			Self::Decode
		} else {
			Self::Encode
		}
	}
}

/// source, destination and direction of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	source: PathBuf,
	destination: PathBuf,
	mode: Mode,
}

impl Config {
	/// convert `source` into `destination`, picking the mode from the source name.
	pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
		let source = source.into();
		let mode = Mode::for_source(&source);
		Self::with_mode(source, destination, mode)
	}

	/// convert `source` into `destination` in the given direction.
	pub fn with_mode(
		source: impl Into<PathBuf>,
		destination: impl Into<PathBuf>,
		mode: Mode,
	) -> Self {
		Self {
			source: source.into(),
			destination: destination.into(),
			mode,
		}
	}

	/// file to read
	pub fn source(&self) -> &Path {
		&self.source
	}

	/// file to (over)write
	pub fn destination(&self) -> &Path {
		&self.destination
	}

	/// direction of the conversion
	pub fn mode(&self) -> Mode {
		self.mode
	}
}
