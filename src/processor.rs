//! Per-chunk in-place transforms applied by workers before searching.
//!
//! Processors run inside worker threads, in order, between the chunk queue
//! and the searcher. Each worker owns its own chain, so implementations
//! may keep scratch state without synchronization.

use crate::chunk::DataChunk;
use crate::error::Result;
use flate2::read::GzDecoder;
use std::io::Read;

/// A transform that takes a chunk, rewrites it in place, and hands it on.
pub trait InplaceProcessor: Send {
    /// Transform `chunk` before it reaches the searcher.
    fn process(&mut self, chunk: &mut DataChunk) -> Result<()>;
}

/// Computes the chunk's newline index by scanning for `\n` bytes.
///
/// The scan goes through `memchr`, which is SIMD-accelerated on the
/// platforms we care about; the result is identical to a scalar scan.
/// Wired into the chain iff line numbers were requested.
pub struct NewlineIndexer;

impl InplaceProcessor for NewlineIndexer {
    fn process(&mut self, chunk: &mut DataChunk) -> Result<()> {
        let index: Vec<usize> = memchr::memchr_iter(b'\n', chunk.bytes()).collect();
        chunk.set_newline_index(index);
        Ok(())
    }
}

/// Replaces a chunk's payload with its gzip-decompressed bytes.
///
/// The chunk must hold one complete gzip member. `original_offset` is
/// preserved so the raw source position stays reportable; `actual_offset`
/// is left to whoever produced the chunk, since only the producer knows
/// where the member lands in the logical stream.
pub struct GzipDecompressor;

impl InplaceProcessor for GzipDecompressor {
    fn process(&mut self, chunk: &mut DataChunk) -> Result<()> {
        let mut decompressed = Vec::with_capacity(chunk.len().saturating_mul(3));
        GzDecoder::new(chunk.bytes()).read_to_end(&mut decompressed)?;
        chunk.replace_bytes(decompressed);
        Ok(())
    }
}
