//! Chunk readers: turn an input source into ordered, line-aligned chunks.
//!
//! A reader produces `(DataChunk, chunk_index)` pairs whose bytes,
//! concatenated in index order, reconstruct the source exactly. Every
//! chunk ends right after a `\n`, except the final chunk of a source
//! without a trailing newline. Indices start at 0 and are contiguous.
//!
//! Three variants:
//! - [`FileBlockReader`]: sequential reads into heap buffers; handles
//!   stdin and transparently decompresses `.gz` files
//! - [`MmapBlockReader`]: read-only memory map; chunks are windows into
//!   the shared map
//! - [`PartitionedReader`]: concurrent readers over precomputed
//!   line-aligned partitions, for callers with an external line index
//!
//! Readers take `&self` so the executor can drive one reader from several
//! threads; sequential variants serialize internally.

use crate::chunk::DataChunk;
use crate::error::{Result, SearchError};
use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{stdin, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Default target chunk size (16 MiB). Reads extend past this to the next
/// newline so lines are never split.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Buffer size for the buffered reader underneath streamed sources.
const BUFFER_SIZE: usize = 128 * 1024;

/// A source of ordered, line-aligned chunks.
pub trait ChunkReader: Send + Sync {
    /// Produce the next chunk, or `None` once the source is exhausted.
    ///
    /// An I/O failure is reported as `Err` exactly once; every call after
    /// that returns `Ok(None)`.
    fn next_chunk(&self) -> Result<Option<(DataChunk, u64)>>;
}

/// Sequential streamed reader over a file, stdin, or any `BufRead`.
pub struct FileBlockReader {
    inner: Mutex<StreamState>,
}

impl std::fmt::Debug for FileBlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlockReader").finish_non_exhaustive()
    }
}

struct StreamState {
    source: Box<dyn BufRead + Send>,
    block_size: usize,
    next_index: u64,
    offset: u64,
    next_line: u64,
    track_lines: bool,
    done: bool,
}

impl FileBlockReader {
    /// Open a path for streamed chunking. `"-"` reads standard input;
    /// files ending in `.gz` (case-insensitive) are decompressed on the
    /// fly, in which case offsets refer to the decompressed stream.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str() == Some("-") {
            return Ok(Self::stdin(block_size));
        }

        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(SearchError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let is_gzip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        let source: Box<dyn BufRead + Send> = if is_gzip {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
        };
        Ok(Self::from_reader(source, block_size))
    }

    /// Chunk standard input.
    pub fn stdin(block_size: usize) -> Self {
        Self::from_reader(
            Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())),
            block_size,
        )
    }

    /// Chunk an arbitrary buffered source.
    pub fn from_reader(source: Box<dyn BufRead + Send>, block_size: usize) -> Self {
        FileBlockReader {
            inner: Mutex::new(StreamState {
                source,
                block_size: block_size.max(1),
                next_index: 0,
                offset: 0,
                next_line: 1,
                track_lines: false,
                done: false,
            }),
        }
    }

    /// Track line numbers: each emitted chunk carries the 1-based line
    /// number of its first byte.
    pub fn track_lines(self, enabled: bool) -> Self {
        self.inner.lock().unwrap().track_lines = enabled;
        self
    }
}

impl ChunkReader for FileBlockReader {
    fn next_chunk(&self) -> Result<Option<(DataChunk, u64)>> {
        let mut st = self.inner.lock().unwrap();
        if st.done {
            return Ok(None);
        }

        let block_size = st.block_size;
        let mut buf = Vec::with_capacity(block_size + 512);
        match read_block(&mut st.source, block_size, &mut buf) {
            Ok(()) => {}
            Err(err) => {
                st.done = true;
                return Err(err.into());
            }
        }

        if buf.is_empty() {
            st.done = true;
            return Ok(None);
        }

        let mut chunk = DataChunk::new(buf, st.offset);
        if st.track_lines {
            chunk.set_first_line_number(st.next_line);
            st.next_line += memchr::memchr_iter(b'\n', chunk.bytes()).count() as u64;
        }
        st.offset += chunk.len() as u64;
        let index = st.next_index;
        st.next_index += 1;
        Ok(Some((chunk, index)))
    }
}

/// Read at least `block_size` bytes, then extend to the next `\n` so the
/// block never splits a line. A trailing unterminated line is kept whole.
fn read_block(
    source: &mut Box<dyn BufRead + Send>,
    block_size: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<()> {
    Read::take(&mut *source, block_size as u64).read_to_end(buf)?;
    if !buf.is_empty() && buf.last() != Some(&b'\n') {
        source.read_until(b'\n', buf)?;
    }
    Ok(())
}

/// Memory-mapped reader: chunks are read-only windows into one shared map.
///
/// The `Arc<Mmap>` travels inside each chunk, so the mapping is unmapped
/// only after the last chunk referencing it has been released. Workers
/// must not mutate mapped bytes; processors that would are expected to
/// copy the chunk off the map first (see [`DataChunk::bytes_mut`]).
pub struct MmapBlockReader {
    map: Option<Arc<Mmap>>,
    inner: Mutex<MapState>,
}

impl std::fmt::Debug for MmapBlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapBlockReader").finish_non_exhaustive()
    }
}

struct MapState {
    pos: usize,
    block_size: usize,
    next_index: u64,
    next_line: u64,
    track_lines: bool,
}

impl MmapBlockReader {
    /// Map a regular file read-only. Standard input cannot be mapped and
    /// is rejected here; use [`FileBlockReader::stdin`] instead.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str() == Some("-") {
            return Err(SearchError::Io(
                "standard input cannot be memory-mapped".to_string(),
            ));
        }

        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(SearchError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let map = if metadata.len() == 0 {
            // Zero-length mappings are rejected by the OS; an empty file
            // simply produces no chunks.
            None
        } else {
            Some(Arc::new(unsafe {
                Mmap::map(&file).map_err(|e| SearchError::Io(e.to_string()))?
            }))
        };

        Ok(MmapBlockReader {
            map,
            inner: Mutex::new(MapState {
                pos: 0,
                block_size: block_size.max(1),
                next_index: 0,
                next_line: 1,
                track_lines: false,
            }),
        })
    }

    /// Track line numbers for emitted chunks.
    pub fn track_lines(self, enabled: bool) -> Self {
        self.inner.lock().unwrap().track_lines = enabled;
        self
    }
}

impl ChunkReader for MmapBlockReader {
    fn next_chunk(&self) -> Result<Option<(DataChunk, u64)>> {
        let map = match &self.map {
            Some(map) => map,
            None => return Ok(None),
        };

        let mut st = self.inner.lock().unwrap();
        if st.pos >= map.len() {
            return Ok(None);
        }

        let start = st.pos;
        let mut end = (start + st.block_size).min(map.len());
        if end < map.len() {
            end = match memchr::memchr(b'\n', &map[end..]) {
                Some(p) => end + p + 1,
                None => map.len(),
            };
        }

        let mut chunk = DataChunk::from_map(Arc::clone(map), start..end);
        if st.track_lines {
            chunk.set_first_line_number(st.next_line);
            st.next_line += memchr::memchr_iter(b'\n', &map[start..end]).count() as u64;
        }
        st.pos = end;
        let index = st.next_index;
        st.next_index += 1;
        Ok(Some((chunk, index)))
    }
}

/// A precomputed, line-aligned slice of the input file.
///
/// Partitions come from an external index; the reader trusts that each
/// one starts at a line boundary and ends at a line boundary or EOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Absolute byte offset of the partition start.
    pub offset: u64,
    /// Partition length in bytes.
    pub len: u64,
    /// 1-based line number at `offset`; 0 when lines are untracked.
    pub first_line: u64,
}

/// Multi-reader variant: several threads pull partitions concurrently.
///
/// Chunk indices are assigned in the order partitions are handed out, not
/// in the order reads complete, so the sink still sees a single monotonic
/// sequence.
pub struct PartitionedReader {
    file: File,
    queue: Mutex<PartitionQueue>,
}

struct PartitionQueue {
    parts: VecDeque<Partition>,
    next_index: u64,
    failed: bool,
}

impl PartitionedReader {
    /// Open `path` and serve the given partitions in order.
    pub fn open<P: AsRef<Path>>(path: P, partitions: Vec<Partition>) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str() == Some("-") {
            return Err(SearchError::Io(
                "standard input cannot be partitioned".to_string(),
            ));
        }
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(SearchError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(PartitionedReader {
            file: File::open(path)?,
            queue: Mutex::new(PartitionQueue {
                parts: partitions.into(),
                next_index: 0,
                failed: false,
            }),
        })
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut read = 0;
            while read < buf.len() {
                let n = self.file.seek_read(&mut buf[read..], offset + read as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                read += n;
            }
            Ok(())
        }
    }
}

impl ChunkReader for PartitionedReader {
    fn next_chunk(&self) -> Result<Option<(DataChunk, u64)>> {
        // Claim a partition and its index under the lock; do the actual
        // read outside it so readers overlap.
        let (part, index) = {
            let mut q = self.queue.lock().unwrap();
            if q.failed {
                return Ok(None);
            }
            match q.parts.pop_front() {
                Some(part) => {
                    let index = q.next_index;
                    q.next_index += 1;
                    (part, index)
                }
                None => return Ok(None),
            }
        };

        let mut buf = vec![0u8; part.len as usize];
        if let Err(err) = self.read_at(&mut buf, part.offset) {
            self.queue.lock().unwrap().failed = true;
            return Err(err.into());
        }

        let mut chunk = DataChunk::new(buf, part.offset);
        chunk.set_first_line_number(part.first_line);
        Ok(Some((chunk, index)))
    }
}
