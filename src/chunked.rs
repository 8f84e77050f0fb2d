//! growable append-only byte buffer built from fixed-size chunks.
//!
//! used to pull a file of unknown length into memory without repeatedly
//! reallocating (and copying) one ever-growing block.

use crate::{try_alloc_zeroed, try_alloc_empty, Error, Result};
use core::cmp::min;
use std::io::{ErrorKind, Read};

/// chunk capacity used when reading source files.
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

#[derive(Debug)]
struct Chunk {
	data: Box<[u8]>,
	written: usize,
}

impl Chunk {
	fn with_capacity(capacity: usize) -> Result<Self> {
		Ok(Self {
			data: try_alloc_zeroed(capacity)?.into_boxed_slice(),
			written: 0,
		})
	}

	fn is_full(&self) -> bool {
		self.written == self.data.len()
	}

	fn filled(&self) -> &[u8] {
		&self.data[..self.written]
	}

	fn spare_mut(&mut self) -> &mut [u8] {
		&mut self.data[self.written..]
	}
}

/// a sequence of fixed-capacity chunks forming one virtual byte stream.
///
/// only the last chunk is ever partially filled; every chunk before it is full.
#[derive(Debug)]
pub struct ChunkedBuffer {
	chunks: Vec<Chunk>,
	chunk_capacity: usize,
	len: usize,
}

impl ChunkedBuffer {
	/// create a buffer holding a single empty chunk of `chunk_capacity` bytes.
	pub fn new(chunk_capacity: usize) -> Result<Self> {
		if chunk_capacity == 0 {
			return Err(Error::ZeroChunkCapacity);
		}
		let mut chunks = Vec::new();
		chunks.try_reserve(1).map_err(|_| Error::Allocation {
			bytes: core::mem::size_of::<Chunk>(),
		})?;
		chunks.push(Chunk::with_capacity(chunk_capacity)?);
		Ok(Self {
			chunks,
			chunk_capacity,
			len: 0,
		})
	}

	/// capacity of every chunk in this buffer
	pub fn chunk_capacity(&self) -> usize {
		self.chunk_capacity
	}

	/// number of chunks currently allocated (always at least one)
	pub fn chunk_count(&self) -> usize {
		self.chunks.len()
	}

	/// total number of bytes written
	pub fn len(&self) -> usize {
		self.len
	}

	/// whether no bytes have been written yet
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// the written part of each chunk, in order.
	pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
		self.chunks.iter().map(Chunk::filled)
	}

	/// the tail chunk, after growing the chain if the tail is full.
	fn tail_with_room(&mut self) -> Result<&mut Chunk> {
		if self.chunks.last().map_or(true, Chunk::is_full) {
			let chunk = Chunk::with_capacity(self.chunk_capacity)?;
			self.chunks.try_reserve(1).map_err(|_| Error::Allocation {
				bytes: core::mem::size_of::<Chunk>(),
			})?;
			self.chunks.push(chunk);
			log::trace!(
				"grew buffer to {} chunks of {} bytes",
				self.chunks.len(),
				self.chunk_capacity
			);
		}
		let last = self.chunks.len() - 1;
		Ok(&mut self.chunks[last])
	}

	/// append `bytes`, spilling into new chunks as needed.
	pub fn extend_from_slice(&mut self, mut bytes: &[u8]) -> Result<()> {
		while !bytes.is_empty() {
			let tail = self.tail_with_room()?;
			let spare = tail.spare_mut();
			let count = min(spare.len(), bytes.len());
			spare[..count].copy_from_slice(&bytes[..count]);
			tail.written += count;
			self.len += count;
			bytes = &bytes[count..];
		}
		Ok(())
	}

	/// read everything `source` has to offer into the buffer.
	///
	/// each read asks for at most one chunk's worth of bytes, and a fresh
	/// chunk is appended whenever the tail fills. stops at the first zero-length
	/// read. returns the number of bytes appended by this call.
	///
	/// on a read error the bytes appended so far are kept.
	pub fn append_from_source<R: Read>(&mut self, mut source: R) -> Result<usize> {
		let mut total = 0;
		loop {
			let tail = self.tail_with_room()?;
			let count = match source.read(tail.spare_mut()) {
				Ok(0) => break,
				Ok(n) => n,
				Err(e) if e.kind() == ErrorKind::Interrupted => continue,
				Err(e) => return Err(Error::SourceRead(e)),
			};
			tail.written += count;
			self.len += count;
			total += count;
		}
		Ok(total)
	}

	/// copy all written bytes into one contiguous, freshly allocated vector.
	pub fn linearize(&self) -> Result<Vec<u8>> {
		let mut out = try_alloc_empty(self.len)?;
		for chunk in self.chunks() {
			out.extend_from_slice(chunk);
		}
		debug_assert_eq!(out.len(), self.len);
		Ok(out)
	}
}
