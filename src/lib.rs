#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub mod chunked;
pub mod codec;
pub mod config;
pub mod grid;


pub use chunked::{ChunkedBuffer, DEFAULT_CHUNK_CAPACITY};
pub use codec::{decode_png, decode_png_with_limit, encode_png};
pub use config::{Config, Mode};
pub use grid::{compute_dimensions, pack, payload, unpack, PayloadError, PixelGrid};

/// conversion error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// the source file could not be opened
	#[error("failed to open source file {}: {source}", .path.display())]
	SourceOpen {
		/// file that was being opened
		path: PathBuf,
		/// underlying I/O error
		source: io::Error,
	},
	/// reading the source failed partway through
	#[error("failed to read source: {0}")]
	SourceRead(#[source] io::Error),
	/// the result could not be written
	#[error("failed to write {}: {source}", .path.display())]
	DestinationWrite {
		/// file that was being written
		path: PathBuf,
		/// underlying I/O error
		source: io::Error,
	},
	/// the PNG encoder or decoder reported an error (its message is kept as-is)
	#[error("image conversion failed: {0}")]
	Codec(String),
	/// the image does not hold a payload written by this crate
	#[error("invalid payload: {0}")]
	InvalidPayload(#[from] PayloadError),
	/// memory for a buffer could not be obtained
	#[error("failed to allocate {bytes} bytes")]
	Allocation {
		/// size of the failed allocation
		bytes: usize,
	},
	/// a chunked buffer was asked for zero-sized chunks
	#[error("chunk capacity must be nonzero")]
	ZeroChunkCapacity,
	/// the payload (of the given size) needs an image larger than PNG allows
	#[error("{0} bytes do not fit in a png image")]
	TooLargeForImage(usize),
}

/// alias for `Result<T, Error>`
pub type Result<T> = core::result::Result<T, Error>;

/// an empty vector able to hold `len` bytes without reallocating.
pub(crate) fn try_alloc_empty(len: usize) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	buf.try_reserve_exact(len)
		.map_err(|_| Error::Allocation { bytes: len })?;
	Ok(buf)
}

/// `len` zero bytes.
pub(crate) fn try_alloc_zeroed(len: usize) -> Result<Vec<u8>> {
	let mut buf = try_alloc_empty(len)?;
	buf.resize(len, 0);
	Ok(buf)
}

/// read the whole of `path` into memory, `chunk_capacity` bytes at a time.
pub fn read_source(path: &Path, chunk_capacity: usize) -> Result<Vec<u8>> {
	let file = File::open(path).map_err(|source| Error::SourceOpen {
		path: path.to_owned(),
		source,
	})?;
	let mut buf = ChunkedBuffer::new(chunk_capacity)?;
	buf.append_from_source(file)?;
	log::debug!(
		"read {} bytes from {} in {} chunks",
		buf.len(),
		path.display(),
		buf.chunk_count()
	);
	buf.linearize()
}

/// replace `path` with `bytes`.
///
/// see [`write_destination_with`].
pub fn write_destination(path: &Path, bytes: &[u8]) -> Result<()> {
	write_destination_with(path, |out| {
		out.write_all(bytes).map_err(|source| Error::DestinationWrite {
			path: path.to_owned(),
			source,
		})
	})?;
	log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
	Ok(())
}

/// replace `path` with whatever `write` produces.
///
/// the data goes to a temporary file next to `path` first and is renamed into
/// place only if `write` succeeds, so `path` is never left half-written.
/// an existing `path` keeps its permissions; a new one gets the same
/// permissions a plain [`File::create`] would give it.
pub fn write_destination_with<F>(path: &Path, write: F) -> Result<()>
where
	F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
	let write_error = |source: io::Error| Error::DestinationWrite {
		path: path.to_owned(),
		source,
	};
	let dir = match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() => dir,
		_ => Path::new("."),
	};
	let mut builder = tempfile::Builder::new();
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		// subject to the umask, like File::create
		builder.permissions(fs::Permissions::from_mode(0o666));
	}
	let mut tmp = builder.tempfile_in(dir).map_err(write_error)?;

	let mut out = BufWriter::new(tmp.as_file_mut());
	write(&mut out)?;
	out.flush().map_err(write_error)?;
	drop(out);

	if let Ok(existing) = fs::metadata(path) {
		tmp.as_file()
			.set_permissions(existing.permissions())
			.map_err(write_error)?;
	}
	tmp.as_file().sync_all().map_err(write_error)?;
	tmp.persist(path).map_err(|e| write_error(e.error))?;
	Ok(())
}

/// store the contents of `source` in a PNG at `destination`.
///
/// returns the width and height of the image.
pub fn encode_file(source: &Path, destination: &Path) -> Result<(u32, u32)> {
	let grid = {
		let data = read_source(source, DEFAULT_CHUNK_CAPACITY)?;
		pack(&data)?
	};
	write_destination_with(destination, |out| encode_png(&grid, out))?;
	log::info!(
		"encoded {} into a {}x{} image at {}",
		source.display(),
		grid.width(),
		grid.height(),
		destination.display()
	);
	Ok((grid.width(), grid.height()))
}

/// recover the file stored in the PNG at `source` and write it to `destination`.
///
/// returns the size of the recovered file.
pub fn decode_file(source: &Path, destination: &Path) -> Result<usize> {
	let file = File::open(source).map_err(|e| Error::SourceOpen {
		path: source.to_owned(),
		source: e,
	})?;
	let limit = match file.metadata() {
		Ok(meta) => codec::decoded_size_limit(meta.len()),
		Err(_) => usize::MAX,
	};
	let grid = decode_png_with_limit(BufReader::new(file), limit)?;
	let data = payload(grid.pixels())?;
	write_destination(destination, data)?;
	log::info!(
		"decoded {} bytes from {} into {}",
		data.len(),
		source.display(),
		destination.display()
	);
	Ok(data.len())
}

/// perform the conversion described by `config`.
pub fn run(config: &Config) -> Result<()> {
	match config.mode() {
		Mode::Encode => encode_file(config.source(), config.destination()).map(|_| ()),
		Mode::Decode => decode_file(config.source(), config.destination()).map(|_| ()),
	}
}
