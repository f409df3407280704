//! Line-aligned data chunks flowing through the search pipeline.
//!
//! A [`DataChunk`] is the unit of work handed from readers to workers: a
//! contiguous, line-aligned slice of the input plus the metadata needed to
//! report absolute byte offsets and line numbers. Chunk bytes are either
//! heap-owned (streamed readers, decompressed data) or a borrowed window
//! into a shared memory map. Mapped bytes are immutable; any processor
//! that wants to mutate them must first copy the chunk off the map via
//! [`DataChunk::bytes_mut`].

use memmap2::Mmap;
use std::ops::Range;
use std::sync::Arc;

/// Chunk payload: owned bytes or a window into a shared memory map.
///
/// The `Arc<Mmap>` keeps the mapping alive for as long as any chunk slices
/// it, so workers can hold chunks after the reader has moved on.
enum ChunkData {
    Owned(Vec<u8>),
    Mapped { map: Arc<Mmap>, range: Range<usize> },
}

/// A line-aligned slice of the input with offset and line metadata.
///
/// Invariants:
/// - the payload ends at EOF or immediately after a `\n`
/// - `newline_index`, once computed, lists the offsets of all `\n` bytes
///   local to the chunk, strictly increasing and `< len`
pub struct DataChunk {
    data: ChunkData,
    /// Absolute offset of the chunk's first byte in the raw source.
    original_offset: u64,
    /// Absolute offset in the post-processing (logical) stream. Equals
    /// `original_offset` unless a decompressor rewrote the payload.
    actual_offset: u64,
    /// 1-based line number of the chunk's first byte; 0 when the reader
    /// was not asked to track lines.
    first_line_number: u64,
    newline_index: Option<Vec<usize>>,
}

impl DataChunk {
    /// Create a chunk owning its bytes, positioned at `offset` in the source.
    pub fn new(bytes: Vec<u8>, offset: u64) -> Self {
        DataChunk {
            data: ChunkData::Owned(bytes),
            original_offset: offset,
            actual_offset: offset,
            first_line_number: 0,
            newline_index: None,
        }
    }

    /// Create a chunk borrowing `range` out of a shared memory map.
    ///
    /// The chunk's offset is the range start; the map is kept alive until
    /// every chunk referencing it has been released.
    pub fn from_map(map: Arc<Mmap>, range: Range<usize>) -> Self {
        let offset = range.start as u64;
        DataChunk {
            data: ChunkData::Mapped { map, range },
            original_offset: offset,
            actual_offset: offset,
            first_line_number: 0,
            newline_index: None,
        }
    }

    /// The chunk payload.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            ChunkData::Owned(v) => v,
            ChunkData::Mapped { map, range } => &map[range.clone()],
        }
    }

    /// Mutable access to the payload, copying off the map first if needed.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        let copied = match &self.data {
            ChunkData::Mapped { map, range } => Some(map[range.clone()].to_vec()),
            ChunkData::Owned(_) => None,
        };
        if let Some(bytes) = copied {
            self.data = ChunkData::Owned(bytes);
        }
        match &mut self.data {
            ChunkData::Owned(v) => v,
            ChunkData::Mapped { .. } => unreachable!(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match &self.data {
            ChunkData::Owned(v) => v.len(),
            ChunkData::Mapped { range, .. } => range.len(),
        }
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute offset of the first byte in the raw source.
    pub fn original_offset(&self) -> u64 {
        self.original_offset
    }

    /// Absolute offset of the first byte in the logical (post-processing)
    /// stream.
    pub fn actual_offset(&self) -> u64 {
        self.actual_offset
    }

    /// Set the logical offset. Used by decompressors that know where the
    /// chunk lands in the decompressed stream.
    pub fn set_actual_offset(&mut self, offset: u64) {
        self.actual_offset = offset;
    }

    /// 1-based line number of the chunk's first byte, or 0 when the reader
    /// did not track lines.
    pub fn first_line_number(&self) -> u64 {
        self.first_line_number
    }

    /// Record the 1-based line number of the chunk's first byte.
    pub fn set_first_line_number(&mut self, line: u64) {
        self.first_line_number = line;
    }

    /// The precomputed newline index, if a [`NewlineIndexer`] ran.
    ///
    /// [`NewlineIndexer`]: crate::processor::NewlineIndexer
    pub fn newline_index(&self) -> Option<&[usize]> {
        self.newline_index.as_deref()
    }

    /// Attach a newline index. Entries must be strictly increasing local
    /// offsets of `\n` bytes, each `< len`.
    pub fn set_newline_index(&mut self, index: Vec<usize>) {
        debug_assert!(
            index.windows(2).all(|w| w[0] < w[1]) && index.last().is_none_or(|&p| p < self.len()),
            "newline index must be strictly increasing and in-bounds"
        );
        self.newline_index = Some(index);
    }

    /// Replace the payload wholesale (decompression). The chunk becomes
    /// owned and any stale newline index is dropped.
    pub fn replace_bytes(&mut self, bytes: Vec<u8>) {
        self.data = ChunkData::Owned(bytes);
        self.newline_index = None;
    }

    /// Number of `\n` bytes at local offsets strictly before `local`.
    ///
    /// Binary-searches the newline index when present, otherwise scans.
    pub fn newlines_before(&self, local: usize) -> usize {
        match &self.newline_index {
            Some(index) => index.partition_point(|&p| p < local),
            None => memchr::memchr_iter(b'\n', &self.bytes()[..local.min(self.len())]).count(),
        }
    }

    /// 1-based line number of the byte at `local`, relative to the whole
    /// input. Only meaningful when the reader tracked lines.
    pub fn line_number_at(&self, local: usize) -> u64 {
        self.first_line_number + self.newlines_before(local) as u64
    }

    /// Bounds `[start, end)` of the line containing the byte at `local`,
    /// excluding the terminating `\n`.
    pub fn line_span(&self, local: usize) -> (usize, usize) {
        let bytes = self.bytes();
        match &self.newline_index {
            Some(index) => {
                let i = index.partition_point(|&p| p < local);
                let start = if i == 0 { 0 } else { index[i - 1] + 1 };
                let end = if i < index.len() { index[i] } else { bytes.len() };
                (start, end)
            }
            None => {
                let start = memchr::memrchr(b'\n', &bytes[..local])
                    .map(|p| p + 1)
                    .unwrap_or(0);
                let end = memchr::memchr(b'\n', &bytes[local..])
                    .map(|p| local + p)
                    .unwrap_or(bytes.len());
                (start, end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn indexed(text: &[u8]) -> DataChunk {
        let mut chunk = DataChunk::new(text.to_vec(), 0);
        let index: Vec<usize> = memchr::memchr_iter(b'\n', text).collect();
        chunk.set_newline_index(index);
        chunk
    }

    #[test]
    fn test_line_span_matches_scan() {
        let text = b"first line\nsecond\n\nlast without newline";
        let with_index = indexed(text);
        let without = DataChunk::new(text.to_vec(), 0);

        for local in 0..text.len() {
            assert_eq!(
                with_index.line_span(local),
                without.line_span(local),
                "span mismatch at offset {}",
                local
            );
        }
    }

    #[test]
    fn test_line_span_bounds() {
        let chunk = indexed(b"abc\ndef\n");
        assert_eq!(chunk.line_span(0), (0, 3));
        assert_eq!(chunk.line_span(2), (0, 3));
        // The newline byte itself belongs to the line it terminates.
        assert_eq!(chunk.line_span(3), (0, 3));
        assert_eq!(chunk.line_span(4), (4, 7));
    }

    #[test]
    fn test_newlines_before() {
        let chunk = indexed(b"a\nb\nc\n");
        assert_eq!(chunk.newlines_before(0), 0);
        assert_eq!(chunk.newlines_before(1), 0);
        assert_eq!(chunk.newlines_before(2), 1);
        assert_eq!(chunk.newlines_before(6), 3);
    }

    #[test]
    fn test_line_number_at() {
        let mut chunk = indexed(b"a\nb\nc\n");
        chunk.set_first_line_number(10);
        assert_eq!(chunk.line_number_at(0), 10);
        assert_eq!(chunk.line_number_at(2), 11);
        assert_eq!(chunk.line_number_at(4), 12);
    }

    #[test]
    fn test_replace_bytes_drops_index() {
        let mut chunk = indexed(b"a\nb\n");
        assert!(chunk.newline_index().is_some());
        chunk.replace_bytes(b"replaced".to_vec());
        assert!(chunk.newline_index().is_none());
        assert_eq!(chunk.bytes(), b"replaced");
    }

    #[test]
    fn test_mapped_chunk_copies_on_write() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"mapped contents\n").unwrap();
        file.flush().unwrap();

        let map = Arc::new(unsafe { Mmap::map(file.as_file()).unwrap() });
        let mut chunk = DataChunk::from_map(Arc::clone(&map), 0..map.len());
        assert_eq!(chunk.bytes(), b"mapped contents\n");
        assert_eq!(chunk.original_offset(), 0);

        chunk.bytes_mut()[0] = b'M';
        assert_eq!(chunk.bytes(), b"Mapped contents\n");
        // The map itself is untouched.
        assert_eq!(&map[..1], b"m");
    }
}
